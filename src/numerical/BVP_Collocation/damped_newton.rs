//! Damped Newton iteration for the collocation equations, written as a finite state machine
//!
//!  Evaluating --(max |delta| <= tol)--> Converged
//!  Evaluating --(full step lowers the cost)--> StepAccepted --> Evaluating
//!  Evaluating --(full step does not lower the cost)--> LineSearching
//!  LineSearching --(alpha*delta lowers the cost)--> StepAccepted
//!  LineSearching --(max |alpha*delta| <= tol)--> Converged
//!  Evaluating --(max_iterations reached)--> Failed
//!
//! cost = sum of squares of all residual entries. A trial trajectory is always a separate
//! clone, the problem trajectory is only replaced on acceptance.
use crate::numerical::BVP_Collocation::BVP_errors::BvpError;
use crate::numerical::BVP_Collocation::BVP_problem::BVPProblem;
use crate::numerical::BVP_Collocation::BVP_utils::{
    CustomTimer, elapsed_time, exceeds_tolerance, max_abs, statistics_table,
};
use crate::numerical::BVP_Collocation::block_elimination::solve_block_bidiagonal;
use crate::numerical::BVP_Collocation::constraint_evaluator::{
    ConstraintBlocks, constraint_matrix_blocks, constraint_vector_blocks, sum_of_squares,
};
use log::{error, info, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Pending backtracking along -delta from the last accepted trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearch {
    pub delta: Vec<DVector<f64>>,
    /// factor of the last tried step
    pub alpha: f64,
    /// directional derivative of the cost along -alpha*delta
    pub dcost: f64,
    /// cost of the last accepted trajectory
    pub old_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewtonState {
    Evaluating,
    StepAccepted,
    LineSearching(LineSearch),
    Converged,
    Failed,
}

/// Outcome of a successful solve
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub accepted_full_steps: usize,
    pub line_search_trials: usize,
    pub linear_solves: usize,
    pub final_cost: f64,
    pub elapsed: Duration,
}

/// Newton step delta with J delta = r for the residual and Jacobian blocks
pub fn newton_step(
    blocks: &ConstraintBlocks,
    b0: &DMatrix<f64>,
    b1: &DMatrix<f64>,
) -> Result<Vec<DVector<f64>>, BvpError> {
    solve_block_bidiagonal(&blocks.a, &blocks.b, b0, b1, &blocks.residual)
}

/// -sum_i r[i] . (A[i] delta[i] + B[i] delta[i+1]) - r[N-1] . (B0 delta[0] + B1 delta[N-1])
pub fn directional_derivative(
    blocks: &ConstraintBlocks,
    delta: &[DVector<f64>],
    b0: &DMatrix<f64>,
    b1: &DMatrix<f64>,
) -> f64 {
    let n = delta.len();
    let mut dcost = 0.0;
    for i in 0..n - 1 {
        let j_delta = &blocks.a[i] * &delta[i] + &blocks.b[i] * &delta[i + 1];
        dcost -= blocks.residual[i].dot(&j_delta);
    }
    let boundary = b0 * &delta[0] + b1 * &delta[n - 1];
    dcost -= blocks.residual[n - 1].dot(&boundary);
    dcost
}

/// x - alpha * delta, pointwise
pub fn apply_step(x: &[DVector<f64>], delta: &[DVector<f64>], alpha: f64) -> Vec<DVector<f64>> {
    x.iter().zip(delta.iter()).map(|(xi, di)| xi - di * alpha).collect()
}

pub struct DampedNewton<'a> {
    problem: &'a mut BVPProblem,
    tolerance: f64,
    max_iterations: usize,
    pub iteration: usize,
    pub cost: f64,
    pub calc_statistics: HashMap<String, usize>,
    timer: CustomTimer,
}

impl<'a> DampedNewton<'a> {
    pub fn new(problem: &'a mut BVPProblem) -> DampedNewton<'a> {
        let tolerance = problem.config().tolerance;
        let max_iterations = problem.config().max_iterations;
        DampedNewton {
            problem,
            tolerance,
            max_iterations,
            iteration: 0,
            cost: f64::INFINITY,
            calc_statistics: HashMap::new(),
            timer: CustomTimer::new(),
        }
    }

    fn count(&mut self, counter: &str) {
        *self.calc_statistics.entry(counter.to_string()).or_insert(0) += 1;
    }

    fn counter(&self, counter: &str) -> usize {
        self.calc_statistics.get(counter).copied().unwrap_or(0)
    }

    fn trial_cost(&mut self, trial: &[DVector<f64>]) -> Result<f64, BvpError> {
        self.timer.fun_tic();
        let residual = constraint_vector_blocks(&*self.problem, trial);
        self.timer.fun_tac();
        Ok(sum_of_squares(&residual?))
    }

    fn evaluate_blocks(&mut self) -> Result<ConstraintBlocks, BvpError> {
        let x = self.problem.trajectory();
        self.timer.fun_tic();
        let residual = constraint_vector_blocks(&*self.problem, x)?;
        self.timer.fun_tac();
        self.timer.jac_tic();
        let (a, b) = constraint_matrix_blocks(&*self.problem, x)?;
        self.timer.jac_tac();
        Ok(ConstraintBlocks { residual, a, b })
    }

    fn accept(&mut self, trial: Vec<DVector<f64>>, cost: f64) -> NewtonState {
        self.problem.trajectory = trial;
        self.cost = cost;
        NewtonState::StepAccepted
    }

    fn evaluate(&mut self) -> Result<NewtonState, BvpError> {
        if self.iteration >= self.max_iterations {
            return Ok(NewtonState::Failed);
        }
        self.iteration += 1;
        self.count("number of iterations");

        let blocks = self.evaluate_blocks()?;
        let cost = blocks.cost();
        self.cost = cost;

        self.timer.linear_system_tic();
        let delta = newton_step(&blocks, self.problem.b0(), self.problem.b1());
        self.timer.linear_system_tac();
        let delta = delta?;
        self.count("number of solving linear systems");
        if delta.iter().any(|d| d.iter().any(|v| !v.is_finite())) {
            error!("\n \n NaN in Newton step \n \n");
            return Err(BvpError::SingularMatrix {
                context: "Newton step".to_string(),
            });
        }
        let step_size = max_abs(&delta);
        info!(
            "iteration {}: cost = {:e}, max |delta| = {:e}",
            self.iteration, cost, step_size
        );
        if !exceeds_tolerance(&delta, self.tolerance) {
            return Ok(NewtonState::Converged);
        }

        let trial = apply_step(self.problem.trajectory(), &delta, 1.0);
        let trial_cost = self.trial_cost(&trial)?;
        if trial_cost < cost {
            info!("full Newton step accepted, cost {:e} -> {:e}", cost, trial_cost);
            self.count("number of accepted full steps");
            return Ok(self.accept(trial, trial_cost));
        }
        let dcost = directional_derivative(&blocks, &delta, self.problem.b0(), self.problem.b1());
        info!(
            "full Newton step rejected (cost {:e} -> {:e}), line search with dcost = {:e}",
            cost, trial_cost, dcost
        );
        Ok(NewtonState::LineSearching(LineSearch {
            delta,
            alpha: 1.0,
            dcost,
            old_cost: cost,
        }))
    }

    fn line_search_trial(&mut self, search: LineSearch) -> Result<NewtonState, BvpError> {
        let LineSearch {
            delta,
            mut alpha,
            mut dcost,
            old_cost,
        } = search;
        if dcost > 0.0 {
            warn!("not a descent direction (dcost = {:e}), reversing the step", dcost);
            alpha = -alpha;
            dcost = -dcost;
        } else {
            alpha /= 2.0;
            dcost /= 2.0;
        }
        self.count("number of line search trials");

        let scaled: Vec<DVector<f64>> = delta.iter().map(|d| d * alpha).collect();
        if !exceeds_tolerance(&scaled, self.tolerance) {
            info!("damped step below tolerance (alpha = {}), converged", alpha);
            return Ok(NewtonState::Converged);
        }
        let trial = apply_step(self.problem.trajectory(), &delta, alpha);
        let trial_cost = self.trial_cost(&trial)?;
        info!("alpha = {}: cost {:e} -> {:e}", alpha, old_cost, trial_cost);
        if trial_cost < old_cost {
            return Ok(self.accept(trial, trial_cost));
        }
        Ok(NewtonState::LineSearching(LineSearch {
            delta,
            alpha,
            dcost,
            old_cost,
        }))
    }

    /// One transition of the state machine
    pub fn next_state(&mut self, state: NewtonState) -> Result<NewtonState, BvpError> {
        match state {
            NewtonState::Evaluating | NewtonState::StepAccepted => self.evaluate(),
            NewtonState::LineSearching(search) => self.line_search_trial(search),
            NewtonState::Converged => Ok(NewtonState::Converged),
            NewtonState::Failed => Ok(NewtonState::Failed),
        }
    }

    fn calc_statistics(&self) {
        let mut stats = self.calc_statistics.clone();
        stats.insert("number of grid points".to_string(), self.problem.n());
        stats.insert("length of state vector".to_string(), self.problem.p());
        info!("\n \n CALC STATISTICS \n \n {}", statistics_table(&stats));
        self.timer.get_all();
    }

    pub fn run(mut self) -> Result<SolveReport, BvpError> {
        info!("\n \n solving collocation equations with damped Newton method \n \n");
        let begin = Instant::now();
        let mut state = NewtonState::Evaluating;
        loop {
            state = self.next_state(state)?;
            match state {
                NewtonState::Converged => break,
                NewtonState::Failed => {
                    error!(
                        "no convergence after {} iterations, cost = {:e}",
                        self.iteration, self.cost
                    );
                    self.calc_statistics();
                    return Err(BvpError::Converge {
                        iterations: self.iteration,
                        cost: self.cost,
                    });
                }
                _ => {}
            }
        }
        let elapsed = begin.elapsed();
        elapsed_time(elapsed);
        info!("\n \n Solution has converged, cost = {:e}", self.cost);
        self.calc_statistics();
        Ok(SolveReport {
            iterations: self.iteration,
            accepted_full_steps: self.counter("number of accepted full steps"),
            line_search_trials: self.counter("number of line search trials"),
            linear_solves: self.counter("number of solving linear systems"),
            final_cost: self.cost,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::BVP_Collocation::solver_config::SolverConfig;
    use crate::numerical::Examples_and_utils::TestProblem;
    use approx::assert_relative_eq;

    fn easy_bvp(n: usize) -> BVPProblem {
        let problem = TestProblem::MattheijEasy;
        let mesh: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let (b0, b1) = problem.boundary_matrices();
        let e = std::f64::consts::E;
        let b = DMatrix::from_column_slice(3, 1, &[1.0, e, e * (1.0f64.sin() + 1.0f64.cos())]);
        BVPProblem::without_initial_guess(problem.ode(), mesh, b0, b1, problem.beta(), b).unwrap()
    }

    fn lorenz_bvp(n: usize) -> BVPProblem {
        let problem = TestProblem::Lorenz;
        let mesh: Vec<f64> = (0..n).map(|i| 0.5 * i as f64 / (n - 1) as f64).collect();
        let guess: Vec<DMatrix<f64>> = mesh
            .iter()
            .map(|t| DMatrix::from_column_slice(3, 1, &[1.0 + t, 1.0 - t, 20.0 + 3.0 * t]))
            .collect();
        let (b0, b1) = problem.boundary_matrices();
        let b = DMatrix::from_column_slice(3, 1, &[1.0, 1.0, 20.0]);
        BVPProblem::new(problem.ode(), mesh, guess, b0, b1, problem.beta(), b).unwrap()
    }

    #[test]
    fn test_directional_derivative_is_minus_cost() {
        let bvp = lorenz_bvp(41);
        let blocks = ConstraintBlocks::evaluate(&bvp, bvp.trajectory()).unwrap();
        let delta = newton_step(&blocks, bvp.b0(), bvp.b1()).unwrap();
        let dcost = directional_derivative(&blocks, &delta, bvp.b0(), bvp.b1());
        assert!(dcost < 0.0);
        assert_relative_eq!(dcost, -blocks.cost(), max_relative = 1e-8);
    }

    #[test]
    fn test_apply_step() {
        let x = vec![DVector::from_vec(vec![1.0, 2.0])];
        let d = vec![DVector::from_vec(vec![2.0, -2.0])];
        assert_eq!(apply_step(&x, &d, 0.5), vec![DVector::from_vec(vec![0.0, 3.0])]);
    }

    #[test]
    fn test_linear_problem_full_step_then_converged() {
        let mut bvp = easy_bvp(101);
        let mut newton = DampedNewton::new(&mut bvp);
        let state = newton.next_state(NewtonState::Evaluating).unwrap();
        assert_eq!(state, NewtonState::StepAccepted);
        assert!(newton.cost < 1e-16);
        let state = newton.next_state(state).unwrap();
        assert_eq!(state, NewtonState::Converged);
        assert_eq!(newton.iteration, 2);
        assert!(bvp.boundary_residual().amax() < 1e-10);
    }

    #[test]
    fn test_line_search_halves_alpha() {
        let mut bvp = easy_bvp(51);
        let blocks = ConstraintBlocks::evaluate(&bvp, bvp.trajectory()).unwrap();
        let delta = newton_step(&blocks, bvp.b0(), bvp.b1()).unwrap();
        let cost = blocks.cost();
        let dcost = directional_derivative(&blocks, &delta, bvp.b0(), bvp.b1());
        let search = LineSearch { delta, alpha: 1.0, dcost, old_cost: cost };
        let mut newton = DampedNewton::new(&mut bvp);
        let state = newton.next_state(NewtonState::LineSearching(search)).unwrap();
        assert_eq!(state, NewtonState::StepAccepted);
        // the residual of a linear problem is halved by half a Newton step
        assert_relative_eq!(newton.cost, cost / 4.0, max_relative = 1e-6);
        assert_eq!(newton.calc_statistics["number of line search trials"], 1);
    }

    #[test]
    fn test_line_search_reverses_non_descent_direction() {
        let mut bvp = easy_bvp(51);
        let blocks = ConstraintBlocks::evaluate(&bvp, bvp.trajectory()).unwrap();
        let reversed: Vec<DVector<f64>> = newton_step(&blocks, bvp.b0(), bvp.b1())
            .unwrap()
            .into_iter()
            .map(|d| -d)
            .collect();
        let cost = blocks.cost();
        let dcost = directional_derivative(&blocks, &reversed, bvp.b0(), bvp.b1());
        assert!(dcost > 0.0);
        let search = LineSearch { delta: reversed, alpha: 1.0, dcost, old_cost: cost };
        let mut newton = DampedNewton::new(&mut bvp);
        let state = newton.next_state(NewtonState::LineSearching(search)).unwrap();
        assert_eq!(state, NewtonState::StepAccepted);
        assert!(newton.cost < 1e-16);
    }

    #[test]
    fn test_line_search_converges_on_tiny_step() {
        let mut bvp = easy_bvp(11);
        let delta = vec![DVector::from_element(3, 1e-6); 11];
        let search = LineSearch { delta, alpha: 1.0, dcost: -1.0, old_cost: 0.0 };
        let mut newton = DampedNewton::new(&mut bvp);
        let state = newton.next_state(NewtonState::LineSearching(search)).unwrap();
        assert_eq!(state, NewtonState::Converged);
        assert!(bvp.trajectory().iter().all(|x| x.norm() == 0.0));
    }

    #[test]
    fn test_line_search_step_equal_to_tolerance_converges() {
        let mut bvp = easy_bvp(11);
        let tol = bvp.config().tolerance;
        // after halving alpha the largest entry of alpha*delta is exactly tol
        let delta = vec![DVector::from_element(3, 2.0 * tol); 11];
        let search = LineSearch { delta, alpha: 1.0, dcost: -1.0, old_cost: 0.0 };
        let mut newton = DampedNewton::new(&mut bvp);
        let state = newton.next_state(NewtonState::LineSearching(search)).unwrap();
        assert_eq!(state, NewtonState::Converged);
    }

    #[test]
    fn test_rejected_step_keeps_searching() {
        let mut bvp = easy_bvp(11);
        let delta = vec![DVector::from_element(3, 1.0); 11];
        let search = LineSearch { delta, alpha: 1.0, dcost: -1.0, old_cost: 0.0 };
        let mut newton = DampedNewton::new(&mut bvp);
        match newton.next_state(NewtonState::LineSearching(search)).unwrap() {
            NewtonState::LineSearching(next) => {
                assert_eq!(next.alpha, 0.5);
                assert_eq!(next.dcost, -0.5);
            }
            other => panic!("expected LineSearching, got {:?}", other),
        }
        assert!(bvp.trajectory().iter().all(|x| x.norm() == 0.0));
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let bvp = easy_bvp(21);
        let mut bvp = bvp
            .with_config(SolverConfig::new().with_max_iterations(1))
            .unwrap();
        match DampedNewton::new(&mut bvp).run() {
            Err(BvpError::Converge { iterations, cost }) => {
                assert_eq!(iterations, 1);
                assert!(cost.is_finite());
            }
            other => panic!("expected ConvergeError, got {:?}", other),
        }
        // the accepted step is kept
        assert!(bvp.boundary_residual().amax() < 1e-10);
    }

    #[test]
    fn test_terminal_states_are_fixed_points() {
        let mut bvp = easy_bvp(11);
        let mut newton = DampedNewton::new(&mut bvp);
        assert_eq!(newton.next_state(NewtonState::Converged).unwrap(), NewtonState::Converged);
        assert_eq!(newton.next_state(NewtonState::Failed).unwrap(), NewtonState::Failed);
        assert_eq!(newton.iteration, 0);
    }
}
