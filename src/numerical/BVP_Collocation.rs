/*
Trapezoidal collocation for two-point boundary value problems.
The continuous problem dx/dt = f(x, t, beta), B0 x(t_0) + B1 x(t_{N-1}) = b is replaced by the
N*P algebraic equations
    r_i = (x_{i+1} - x_i) - h_i/2 (f(x_i) + f(x_{i+1})),   i = 0..N-2
    r_{N-1} = B0 x_0 + B1 x_{N-1} - b
whose Jacobian is block-bidiagonal plus one dense boundary row block. Each Newton step is computed by
an orthogonal block elimination (local QR condensation) in O(N P^3) operations instead of the
O((N P)^3) of a dense solve. The approach follows
- R.M.M. Mattheij, "Decoupling and stability of algorithms for boundary value problems"
- U. Ascher, R. Mattheij, R. Russell "Numerical Solution of Boundary Value Problems for ODEs", ch. 7
*/
pub mod BVP_errors;
pub mod BVP_problem;
pub mod BVP_utils;
pub mod ODE_interface;
pub mod block_elimination;
pub mod boundary_optimality;
pub mod constraint_evaluator;
pub mod cost_surface;
pub mod damped_newton;
pub mod ivp_trapz;
pub mod solver_config;
