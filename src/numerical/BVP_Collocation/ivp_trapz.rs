use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use crate::numerical::BVP_Collocation::ODE_interface::ODESpec;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};

/// Implicit trapezoidal (Crank-Nicolson) march over `mesh` starting from X[0] = x0.
/// Every step takes an explicit Euler predictor and then exactly `newton_iterations` corrections
///     (I - h/2 dfdx(X[i])) delta = (X[i] - X[i-1]) - h/2 (f(X[i]) + f(X[i-1])),   X[i] -= delta
/// The corrections are not checked for convergence.
pub fn integrate_trapezoidal(
    ode: &ODESpec,
    mesh: &[f64],
    beta: &DVector<f64>,
    x0: &DVector<f64>,
    newton_iterations: usize,
) -> Result<Vec<DVector<f64>>, BvpError> {
    let p = ode.p;
    check_shape("x0", (p, 1), x0.shape())?;
    info!(
        "integrating IVP over {} mesh points with {} corrections per step",
        mesh.len(),
        newton_iterations
    );
    let eye = DMatrix::<f64>::identity(p, p);
    let mut x = Vec::with_capacity(mesh.len());
    x.push(x0.clone());
    for i in 1..mesh.len() {
        let h = mesh[i] - mesh[i - 1];
        let f_before = ode.evaluate(&x[i - 1], mesh[i - 1], beta)?;
        let mut xi = &x[i - 1] + &f_before * h;
        for _ in 0..newton_iterations {
            let f_now = ode.evaluate(&xi, mesh[i], beta)?;
            let dfdx = ode.jacobian(&xi, mesh[i], beta)?;
            let lhs = &eye - dfdx * (h / 2.0);
            let rhs = (&xi - &x[i - 1]) - (&f_now + &f_before) * (h / 2.0);
            let delta = lhs.lu().solve(&rhs).ok_or_else(|| BvpError::SingularMatrix {
                context: format!("trapezoidal step {}", i),
            })?;
            xi -= delta;
        }
        x.push(xi);
    }
    debug!("IVP integration finished at t = {:?}", mesh.last());
    Ok(x)
}
