use crate::Utils::logger::init_logger;
use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use crate::numerical::BVP_Collocation::ODE_interface::ODESpec;
use crate::numerical::BVP_Collocation::damped_newton::{DampedNewton, SolveReport};
use crate::numerical::BVP_Collocation::ivp_trapz::integrate_trapezoidal;
use crate::numerical::BVP_Collocation::solver_config::SolverConfig;
use log::info;
use nalgebra::{DMatrix, DVector};

/// Two-point boundary value problem
///     dx/dt = f(x, t, beta),   B0 x(T[0]) + B1 x(T[N-1]) = b
/// together with its current trajectory X[0..N-1] on the time mesh T[0..N-1].
/// All shapes are checked once at construction; afterwards only the trajectory (and, through the
/// explicit setters, b or the boundary matrices) changes.
#[derive(Debug)]
pub struct BVPProblem {
    pub(crate) ode: ODESpec,
    pub(crate) mesh: Vec<f64>,
    pub(crate) trajectory: Vec<DVector<f64>>,
    pub(crate) b0: DMatrix<f64>,
    pub(crate) b1: DMatrix<f64>,
    pub(crate) beta: DVector<f64>,
    pub(crate) b: DVector<f64>,
    pub(crate) n: usize,
    pub(crate) config: SolverConfig,
}

fn column_to_vector(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(m.as_slice())
}

/// mesh must be strictly increasing or strictly decreasing; the first step fixes the direction
fn check_mesh(mesh: &[f64]) -> Result<(), BvpError> {
    if mesh.len() < 2 {
        return Err(BvpError::dimension("mesh", (2, 1), (mesh.len(), 1)));
    }
    let direction = if mesh[1] < mesh[0] { -1.0 } else { 1.0 };
    for i in 1..mesh.len() {
        // also rejects NaN
        if !(direction * (mesh[i] - mesh[i - 1]) > 0.0) {
            return Err(BvpError::InvalidMesh { index: i });
        }
    }
    Ok(())
}

fn check_trajectory(p: usize, n: usize, trajectory: &[DMatrix<f64>]) -> Result<(), BvpError> {
    if trajectory.len() != n {
        return Err(BvpError::dimension("initial_guess", (p, n), (p, trajectory.len())));
    }
    for x in trajectory {
        check_shape("initial_guess", (p, 1), x.shape())?;
    }
    Ok(())
}

impl BVPProblem {
    /// Problem with a user supplied starting trajectory: one P x 1 matrix per mesh point
    pub fn new(
        ode: ODESpec,
        mesh: Vec<f64>,
        initial_guess: Vec<DMatrix<f64>>,
        b0: DMatrix<f64>,
        b1: DMatrix<f64>,
        beta: DMatrix<f64>,
        b: DMatrix<f64>,
    ) -> Result<BVPProblem, BvpError> {
        let p = ode.p;
        let n = mesh.len();
        check_trajectory(p, n, &initial_guess)?;
        check_shape("B0", (p, p), b0.shape())?;
        check_shape("B1", (p, p), b1.shape())?;
        check_shape("beta", (ode.q, 1), beta.shape())?;
        check_shape("b", (p, 1), b.shape())?;
        check_mesh(&mesh)?;

        let trajectory = initial_guess.iter().map(column_to_vector).collect();
        Ok(BVPProblem {
            ode,
            mesh,
            trajectory,
            b0,
            b1,
            beta: column_to_vector(&beta),
            b: column_to_vector(&b),
            n,
            config: SolverConfig::default(),
        })
    }

    /// Problem starting from the zero trajectory
    pub fn without_initial_guess(
        ode: ODESpec,
        mesh: Vec<f64>,
        b0: DMatrix<f64>,
        b1: DMatrix<f64>,
        beta: DMatrix<f64>,
        b: DMatrix<f64>,
    ) -> Result<BVPProblem, BvpError> {
        let initial_guess = vec![DMatrix::zeros(ode.p, 1); mesh.len()];
        Self::new(ode, mesh, initial_guess, b0, b1, beta, b)
    }

    pub fn with_config(mut self, config: SolverConfig) -> Result<BVPProblem, BvpError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn ode(&self) -> &ODESpec {
        &self.ode
    }
    pub fn mesh(&self) -> &[f64] {
        &self.mesh
    }
    pub fn trajectory(&self) -> &[DVector<f64>] {
        &self.trajectory
    }
    pub fn b0(&self) -> &DMatrix<f64> {
        &self.b0
    }
    pub fn b1(&self) -> &DMatrix<f64> {
        &self.b1
    }
    pub fn beta(&self) -> &DVector<f64> {
        &self.beta
    }
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }
    /// number of mesh points
    pub fn n(&self) -> usize {
        self.n
    }
    /// number of state variables
    pub fn p(&self) -> usize {
        self.ode.p
    }
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replaces the whole trajectory, e.g. to restart from a stored solution
    pub fn set_trajectory(&mut self, trajectory: Vec<DMatrix<f64>>) -> Result<(), BvpError> {
        check_trajectory(self.ode.p, self.n, &trajectory)?;
        self.trajectory = trajectory.iter().map(column_to_vector).collect();
        Ok(())
    }

    /// Changes the right-hand side b of the boundary condition
    pub fn set_boundary_value(&mut self, b: DMatrix<f64>) -> Result<(), BvpError> {
        check_shape("b", (self.ode.p, 1), b.shape())?;
        self.b = column_to_vector(&b);
        Ok(())
    }

    /// Changes both boundary matrices and b at once
    pub fn set_boundary_condition(
        &mut self,
        b0: DMatrix<f64>,
        b1: DMatrix<f64>,
        b: DMatrix<f64>,
    ) -> Result<(), BvpError> {
        let p = self.ode.p;
        check_shape("B0", (p, p), b0.shape())?;
        check_shape("B1", (p, p), b1.shape())?;
        check_shape("b", (p, 1), b.shape())?;
        self.b0 = b0;
        self.b1 = b1;
        self.b = column_to_vector(&b);
        Ok(())
    }

    /// B0 X[0] + B1 X[N-1] - b for the current trajectory
    pub fn boundary_residual(&self) -> DVector<f64> {
        &self.b0 * &self.trajectory[0] + &self.b1 * &self.trajectory[self.n - 1] - &self.b
    }

    /// trajectory as N x P matrix, one row per mesh point
    pub fn trajectory_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.ode.p, |i, j| self.trajectory[i][j])
    }

    /// Runs the damped Newton iteration until every entry of the Newton step is below the tolerance.
    /// On failure the (non converged) trajectory of the last accepted step is left in place.
    pub fn solve(&mut self) -> Result<SolveReport, BvpError> {
        init_logger(&self.config)?;
        info!(
            "solving BVP with {} mesh points, {} variables, {} parameters",
            self.n, self.ode.p, self.ode.q
        );
        DampedNewton::new(self).run()
    }

    /// Overwrites the trajectory by integrating the ODE forward from x0 = X[0] with the implicit
    /// trapezoidal rule. Used to manufacture a starting trajectory for `solve`.
    pub fn solve_ivp(&mut self, x0: &DVector<f64>) -> Result<(), BvpError> {
        init_logger(&self.config)?;
        check_shape("x0", (self.ode.p, 1), x0.shape())?;
        let trajectory = integrate_trapezoidal(
            &self.ode,
            &self.mesh,
            &self.beta,
            x0,
            self.config.ivp_newton_iterations,
        )?;
        self.trajectory = trajectory;
        Ok(())
    }
}
