/// Two-point boundary value problems for first-order ODE systems
///  dx/dt = f(x, t, beta),  B0*x(t_first) + B1*x(t_last) = b
/// discretized by the trapezoidal rule and solved with a damped Newton method.
/// Example
/// ```
/// use RustedCollocation::numerical::BVP_Collocation::BVP_problem::BVPProblem;
/// use RustedCollocation::numerical::Examples_and_utils::TestProblem;
/// use nalgebra::DMatrix;
/// let problem = TestProblem::MattheijEasy;
/// let n = 101;
/// let mesh: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
/// let guess: Vec<DMatrix<f64>> = mesh.iter().map(|t| problem.exact_solution(*t).unwrap()).collect();
/// let (b0, b1) = problem.boundary_matrices();
/// let b = &b0 * &guess[0] + &b1 * &guess[n - 1];
/// let mut bvp = BVPProblem::new(problem.ode(), mesh, guess, b0, b1, problem.beta(), b).unwrap();
/// bvp.solve().unwrap();
/// ```
pub mod BVP_Collocation;

/// a collection of reference problems with known properties for testing and benchmarking
pub mod Examples_and_utils;
