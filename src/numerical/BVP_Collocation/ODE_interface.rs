use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::rc::Rc;

/// right-hand side f(x, t, beta)
pub type RhsFn = Box<dyn Fn(&DVector<f64>, f64, &DVector<f64>) -> DVector<f64>>;
/// Jacobian df/dx (x, t, beta)
pub type JacFn = Box<dyn Fn(&DVector<f64>, f64, &DVector<f64>) -> DMatrix<f64>>;
/// one column of df/dbeta (x, t, beta): derivative of f with respect to a single parameter
pub type ParamJacFn = Box<dyn Fn(&DVector<f64>, f64, &DVector<f64>) -> DVector<f64>>;
/// time dependent matrix/vector of a linear system, A(t, beta) or q(t, beta)
pub type LinearCoeffFn<T> = Rc<dyn Fn(f64, &DVector<f64>) -> T>;

/// ODE system dx/dt = f(x, t, beta) with x of length p and beta of length q.
/// Every evaluation checks the shapes of its arguments (and of the values returned by the
/// user supplied functions) before anything is computed.
pub struct ODESpec {
    f: RhsFn,
    dfdx: JacFn,
    dfdbeta: Vec<ParamJacFn>, // empty, or one function per parameter
    pub p: usize, // number of variables (length of x)
    pub q: usize, // number of parameters (length of beta)
}

impl fmt::Debug for ODESpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ODESpec {{ p: {}, q: {}, dfdbeta: {} }}",
            self.p,
            self.q,
            self.dfdbeta.len()
        )
    }
}

impl ODESpec {
    pub fn new(p: usize, q: usize, f: RhsFn, dfdx: JacFn) -> ODESpec {
        ODESpec {
            f,
            dfdx,
            dfdbeta: Vec::new(),
            p,
            q,
        }
    }

    /// ODE with parameter Jacobians; the number of parameters Q is the number of functions in `dfdbeta`
    pub fn with_dfdbeta(p: usize, f: RhsFn, dfdx: JacFn, dfdbeta: Vec<ParamJacFn>) -> ODESpec {
        ODESpec {
            f,
            dfdx,
            q: dfdbeta.len(),
            dfdbeta,
            p,
        }
    }

    /// Attaches the parameter Jacobians, one function per parameter (so exactly Q of them)
    pub fn with_parameter_jacobians(mut self, dfdbeta: Vec<ParamJacFn>) -> Result<ODESpec, BvpError> {
        check_shape("dfdbeta", (self.q, 1), (dfdbeta.len(), 1))?;
        self.dfdbeta = dfdbeta;
        Ok(self)
    }

    pub fn has_parameter_jacobians(&self) -> bool {
        !self.dfdbeta.is_empty()
    }

    fn check_arguments(&self, x: &DVector<f64>, beta: &DVector<f64>) -> Result<(), BvpError> {
        check_shape("x", (self.p, 1), x.shape())?;
        if self.q != 0 {
            check_shape("beta", (self.q, 1), beta.shape())?;
        }
        Ok(())
    }

    /// f(x, t, beta)
    pub fn evaluate(&self, x: &DVector<f64>, t: f64, beta: &DVector<f64>) -> Result<DVector<f64>, BvpError> {
        self.check_arguments(x, beta)?;
        let value = (self.f)(x, t, beta);
        check_shape("f", (self.p, 1), value.shape())?;
        Ok(value)
    }

    /// df/dx (x, t, beta)
    pub fn jacobian(&self, x: &DVector<f64>, t: f64, beta: &DVector<f64>) -> Result<DMatrix<f64>, BvpError> {
        self.check_arguments(x, beta)?;
        let value = (self.dfdx)(x, t, beta);
        check_shape("dfdx", (self.p, self.p), value.shape())?;
        Ok(value)
    }

    /// df/dbeta (x, t, beta) as a P x Q matrix, column k from the k-th parameter Jacobian.
    /// None if the ODE was built without parameter Jacobians.
    pub fn parameter_jacobian(
        &self,
        x: &DVector<f64>,
        t: f64,
        beta: &DVector<f64>,
    ) -> Result<Option<DMatrix<f64>>, BvpError> {
        if self.dfdbeta.is_empty() {
            return Ok(None);
        }
        self.check_arguments(x, beta)?;
        let mut jac = DMatrix::zeros(self.p, self.q);
        for (k, dfdbeta_k) in self.dfdbeta.iter().enumerate() {
            let column = dfdbeta_k(x, t, beta);
            check_shape("dfdbeta", (self.p, 1), column.shape())?;
            jac.set_column(k, &column);
        }
        Ok(Some(jac))
    }
}

/// ODE of the linear system dx/dt = A(t, beta) x + q(t, beta), so that df/dx = A(t, beta)
pub fn linear_ode(
    p: usize,
    q: usize,
    a: LinearCoeffFn<DMatrix<f64>>,
    rhs: LinearCoeffFn<DVector<f64>>,
) -> ODESpec {
    let a_for_f = Rc::clone(&a);
    let f: RhsFn = Box::new(move |x, t, beta| a_for_f(t, beta) * x + rhs(t, beta));
    let dfdx: JacFn = Box::new(move |_x, t, beta| a(t, beta));
    ODESpec::new(p, q, f, dfdx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::Examples_and_utils::{TestProblem, mattheij_a, mattheij_q};
    use approx::assert_relative_eq;

    fn harmonic() -> ODESpec {
        let f: RhsFn = Box::new(|x, _t, beta| DVector::from_vec(vec![x[1], -beta[0] * x[0]]));
        let dfdx: JacFn =
            Box::new(|_x, _t, beta| DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -beta[0], 0.0]));
        ODESpec::new(2, 1, f, dfdx)
    }

    #[test]
    fn test_evaluate_checks_x_dim() {
        let ode = TestProblem::Mattheij.ode();
        let beta = DVector::zeros(2);
        assert!(ode.evaluate(&DVector::zeros(3), 0.0, &beta).is_ok());
        match ode.evaluate(&DVector::zeros(4), 0.0, &beta) {
            Err(BvpError::Dimension(e)) => {
                assert_eq!(e.variable_name, "x");
                assert_eq!(e.expected, (3, 1));
                assert_eq!(e.received, (4, 1));
            }
            other => panic!("wrong x rows not detected: {:?}", other),
        }
    }

    #[test]
    fn test_jacobian_checks_x_dim() {
        let ode = TestProblem::Mattheij.ode();
        let beta = DVector::zeros(2);
        let jac = ode.jacobian(&DVector::zeros(3), 0.0, &beta).unwrap();
        assert_eq!(jac.shape(), (3, 3));
        assert!(ode.jacobian(&DVector::zeros(2), 0.0, &beta).is_err());
    }

    #[test]
    fn test_checks_beta_dim() {
        let ode = TestProblem::Mattheij.ode();
        let x = DVector::zeros(3);
        assert!(ode.evaluate(&x, 0.0, &DVector::zeros(2)).is_ok());
        match ode.jacobian(&x, 0.0, &DVector::zeros(4)) {
            Err(BvpError::Dimension(e)) => {
                assert_eq!(e.variable_name, "beta");
                assert_eq!(e.expected, (2, 1));
                assert_eq!(e.received, (4, 1));
            }
            other => panic!("wrong beta rows not detected: {:?}", other),
        }
        assert!(ode.evaluate(&x, 0.0, &DVector::zeros(1)).is_err());
    }

    #[test]
    fn test_beta_ignored_without_parameters() {
        let f: RhsFn = Box::new(|x, _t, _beta| -x.clone());
        let dfdx: JacFn = Box::new(|_x, _t, _beta| -DMatrix::identity(2, 2));
        let ode = ODESpec::new(2, 0, f, dfdx);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let value = ode.evaluate(&x, 0.0, &DVector::zeros(5)).unwrap();
        assert_eq!(value, DVector::from_vec(vec![-1.0, -2.0]));
    }

    #[test]
    fn test_wrong_output_shape_is_reported() {
        let f: RhsFn = Box::new(|_x, _t, _beta| DVector::zeros(3));
        let dfdx: JacFn = Box::new(|_x, _t, _beta| DMatrix::zeros(2, 3));
        let ode = ODESpec::new(2, 0, f, dfdx);
        let x = DVector::zeros(2);
        let beta = DVector::zeros(0);
        match ode.evaluate(&x, 0.0, &beta) {
            Err(BvpError::Dimension(e)) => assert_eq!(e.variable_name, "f"),
            other => panic!("expected DimensionError, got {:?}", other),
        }
        match ode.jacobian(&x, 0.0, &beta) {
            Err(BvpError::Dimension(e)) => assert_eq!(e.variable_name, "dfdx"),
            other => panic!("expected DimensionError, got {:?}", other),
        }
    }

    #[test]
    fn test_user_ode() {
        let ode = harmonic();
        let beta = DVector::from_vec(vec![4.0]);
        let x = DVector::from_vec(vec![1.0, 0.5]);
        let value = ode.evaluate(&x, 0.0, &beta).unwrap();
        assert_relative_eq!(value[0], 0.5);
        assert_relative_eq!(value[1], -4.0);
        let jac = ode.jacobian(&x, 0.0, &beta).unwrap();
        assert_relative_eq!(jac[(1, 0)], -4.0);
    }

    #[test]
    fn test_parameter_jacobian() {
        let dfdomega: ParamJacFn = Box::new(|x, _t, _beta| DVector::from_vec(vec![0.0, -x[0]]));
        let ode = harmonic().with_parameter_jacobians(vec![dfdomega]).unwrap();
        assert!(ode.has_parameter_jacobians());
        let x = DVector::from_vec(vec![2.0, 0.5]);
        let beta = DVector::from_vec(vec![4.0]);
        let jac = ode.parameter_jacobian(&x, 0.0, &beta).unwrap().unwrap();
        assert_eq!(jac.shape(), (2, 1));
        assert_relative_eq!(jac[(1, 0)], -2.0);
        assert!(ode.parameter_jacobian(&DVector::zeros(3), 0.0, &beta).is_err());
        assert!(harmonic().parameter_jacobian(&x, 0.0, &beta).unwrap().is_none());

        let f: RhsFn = Box::new(|x, _t, beta| DVector::from_vec(vec![x[1], -beta[0] * x[0]]));
        let dfdx: JacFn =
            Box::new(|_x, _t, beta| DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -beta[0], 0.0]));
        let dfdomega: ParamJacFn = Box::new(|x, _t, _beta| DVector::from_vec(vec![0.0, -x[0]]));
        let ode = ODESpec::with_dfdbeta(2, f, dfdx, vec![dfdomega]);
        assert_eq!(ode.q, 1);
        assert_eq!(ode.parameter_jacobian(&x, 0.0, &beta).unwrap().unwrap(), jac);
    }

    #[test]
    fn test_parameter_jacobian_shapes_checked() {
        // two functions for a single parameter
        let first: ParamJacFn = Box::new(|_x, _t, _beta| DVector::zeros(2));
        let second: ParamJacFn = Box::new(|_x, _t, _beta| DVector::zeros(2));
        match harmonic().with_parameter_jacobians(vec![first, second]) {
            Err(BvpError::Dimension(e)) => {
                assert_eq!(e.variable_name, "dfdbeta");
                assert_eq!(e.expected, (1, 1));
                assert_eq!(e.received, (2, 1));
            }
            other => panic!("expected DimensionError, got {:?}", other),
        }
        let too_long: ParamJacFn = Box::new(|_x, _t, _beta| DVector::zeros(3));
        let ode = harmonic().with_parameter_jacobians(vec![too_long]).unwrap();
        let beta = DVector::from_vec(vec![1.0]);
        match ode.parameter_jacobian(&DVector::zeros(2), 0.0, &beta) {
            Err(BvpError::Dimension(e)) => {
                assert_eq!(e.variable_name, "dfdbeta");
                assert_eq!(e.expected, (2, 1));
                assert_eq!(e.received, (3, 1));
            }
            other => panic!("expected DimensionError, got {:?}", other),
        }
    }

    #[test]
    fn test_linear_ode() {
        let ode = TestProblem::Mattheij.ode();
        let x = DVector::from_vec(vec![1.0, 0.1, 0.14]);
        let t = 0.5;
        let beta = DVector::from_vec(vec![19.0, 2.0]);
        let expected = mattheij_a(t, &beta) * &x + mattheij_q(t, &beta);
        let value = ode.evaluate(&x, t, &beta).unwrap();
        assert!((value - expected).norm() < 1e-8);
        let jac = ode.jacobian(&x, t, &beta).unwrap();
        assert!((jac - mattheij_a(t, &beta)).norm() < 1e-8);
    }
}
