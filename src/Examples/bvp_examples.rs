use crate::Utils::logger::save_trajectory_to_csv;
use crate::numerical::BVP_Collocation::BVP_errors::BvpError;
use crate::numerical::BVP_Collocation::BVP_problem::BVPProblem;
use crate::numerical::BVP_Collocation::cost_surface::BoundarySweep;
use crate::numerical::BVP_Collocation::solver_config::SolverConfig;
use crate::numerical::Examples_and_utils::{TestProblem, uniform_mesh};
use nalgebra::{DMatrix, DVector};

fn lorenz_problem(n: usize, config: SolverConfig) -> Result<BVPProblem, BvpError> {
    let problem = TestProblem::Lorenz;
    let (t0, t_end) = problem.span();
    let (b0, b1) = problem.boundary_matrices();
    let b = DMatrix::from_column_slice(3, 1, &[1.0, 1.0, 30.0]);
    let mut bvp = BVPProblem::without_initial_guess(
        problem.ode(),
        uniform_mesh(t0, t_end, n),
        b0,
        b1,
        problem.beta(),
        b,
    )?
    .with_config(config)?;
    bvp.solve_ivp(&DVector::from_vec(vec![1.0, 1.0, 30.0]))?;
    Ok(bvp)
}

pub fn bvp_examples(example: usize) -> Result<(), BvpError> {
    match example {
        0 => {
            // Mattheij problem from the zero trajectory, compared with the exact solution e^t
            let problem = TestProblem::Mattheij;
            let (t0, t_end) = problem.span();
            let n = 1001;
            let (b0, b1) = problem.boundary_matrices();
            let b = problem.boundary_value().unwrap_or_else(|| DMatrix::zeros(3, 1));
            let mut bvp = BVPProblem::without_initial_guess(
                problem.ode(),
                uniform_mesh(t0, t_end, n),
                b0,
                b1,
                problem.beta(),
                b,
            )?
            .with_config(SolverConfig::new().with_loglevel("info"))?;
            let report = bvp.solve()?;
            let max_error = bvp
                .mesh()
                .iter()
                .zip(bvp.trajectory())
                .map(|(t, x)| x.add_scalar(-t.exp()).amax())
                .fold(0.0, f64::max);
            println!(
                "Mattheij: {} iterations, max error vs exact solution {:e}",
                report.iterations, max_error
            );
        }
        1 => {
            // same with the parameters given as a strategy map
            let problem = TestProblem::MattheijEasy;
            let (t0, t_end) = problem.span();
            let params = std::collections::HashMap::from([
                ("tolerance".to_string(), Some(vec![1e-8])),
                ("max_iterations".to_string(), Some(vec![50.0])),
            ]);
            let (b0, b1) = problem.boundary_matrices();
            let b = problem.boundary_value().unwrap_or_else(|| DMatrix::zeros(3, 1));
            let mut bvp = BVPProblem::without_initial_guess(
                problem.ode(),
                uniform_mesh(t0, t_end, 201),
                b0,
                b1,
                problem.beta(),
                b,
            )?
            .with_config(SolverConfig::from_params(&params)?)?;
            let report = bvp.solve()?;
            println!("{:?}", report);
        }
        2 => {
            // Lorenz: IVP trajectory as starting guess, then the BVP solve
            let mut bvp = lorenz_problem(3001, SolverConfig::new().with_loglevel("info"))?;
            let report = bvp.solve()?;
            println!("Lorenz: {:?}", report);
            println!("boundary residual {}", bvp.boundary_residual().transpose());
        }
        3 => {
            // Lorenz with boundary matrices chosen for the best conditioned boundary system,
            // then continuation in b
            let mut bvp = lorenz_problem(1001, SolverConfig::new())?;
            bvp.set_optimal_boundary_matrices()?;
            println!("B0 = {} B1 = {}", bvp.b0(), bvp.b1());
            bvp.solve()?;
            let b = DMatrix::from_column_slice(3, 1, bvp.b().as_slice()) * 1.01;
            bvp.set_boundary_value(b)?;
            let report = bvp.solve()?;
            println!("after continuation: {:?}", report);
        }
        4 => {
            // solve and save the result
            let mut bvp = lorenz_problem(501, SolverConfig::new())?;
            bvp.solve()?;
            save_trajectory_to_csv(
                bvp.mesh(),
                bvp.trajectory(),
                "t",
                &TestProblem::Lorenz.values(),
                "lorenz_result.csv",
            )?;
            println!("result saved");
        }
        5 => {
            // how far the Mattheij solution moves when x1(0) and x2(1) are prescribed differently
            let problem = TestProblem::MattheijEasy;
            let (t0, t_end) = problem.span();
            let (b0, b1) = problem.boundary_matrices();
            let b = problem.boundary_value().unwrap_or_else(|| DMatrix::zeros(3, 1));
            let first = BoundarySweep::new(0, b[0] - 0.2, b[0] + 0.2);
            let second = BoundarySweep::new(1, b[1] - 0.2, b[1] + 0.2);
            let mut bvp = BVPProblem::without_initial_guess(
                problem.ode(),
                uniform_mesh(t0, t_end, 201),
                b0,
                b1,
                problem.beta(),
                b,
            )?;
            let surface = bvp.cost_surface_b(&DMatrix::identity(3, 3), 2, first, second)?;
            println!("cost surface {}", surface.cost);
            surface.save_to_csv("cost_surface_b.csv")?;
        }
        _ => {
            println!("example {} does not exist", example);
        }
    }
    Ok(())
}
