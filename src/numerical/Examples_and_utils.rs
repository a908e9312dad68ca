/// a collection of test problems (with exact solutions where known) for testing the collocation solver
use crate::numerical::BVP_Collocation::ODE_interface::{JacFn, ODESpec, ParamJacFn, RhsFn, linear_ode};
use nalgebra::{DMatrix, DVector};
use std::rc::Rc;
use strum_macros::EnumIter;

/*
Mattheij's linear test problem (3 variables, 2 parameters p, w):
x' = A(t) x + q(t)
    | 1 - p cos(wt)    0    1 + p sin(wt) |
A = |      0           p         0        |
    | -1 + p sin(wt)   0    1 + p cos(wt) |
with q(t) chosen so that x(t) = e^t (1, 1, 1) for p = 19, w = 2.
The easy variant takes q(t) for p = 2, w = 2 (fewer fast growing modes).

Lorenz system (3 variables, 3 parameters sigma, rho, beta):
x' = sigma (y - x)
y' = x (rho - z) - y
z' = x y - beta z
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum TestProblem {
    Mattheij,
    MattheijEasy,
    Lorenz,
}

pub fn mattheij_a(t: f64, beta: &DVector<f64>) -> DMatrix<f64> {
    let p = beta[0];
    let w = beta[1];
    let mut a = DMatrix::zeros(3, 3);
    a[(0, 0)] = 1.0 - p * (w * t).cos();
    a[(0, 2)] = 1.0 + p * (w * t).sin();
    a[(1, 1)] = p;
    a[(2, 0)] = -1.0 + p * (w * t).sin();
    a[(2, 2)] = 1.0 + p * (w * t).cos();
    a
}

/// inhomogeneity making e^t (1,1,1) the solution for the parameter value `p` (and w = 2)
fn mattheij_q_for(t: f64, p: f64) -> DVector<f64> {
    let e = t.exp();
    DVector::from_vec(vec![
        e * (-1.0 + p * ((2.0 * t).cos() - (2.0 * t).sin())),
        (1.0 - p) * e,
        e * (1.0 - p * ((2.0 * t).cos() + (2.0 * t).sin())),
    ])
}

pub fn mattheij_q(t: f64, _beta: &DVector<f64>) -> DVector<f64> {
    mattheij_q_for(t, 19.0)
}

pub fn mattheij_easy_q(t: f64, _beta: &DVector<f64>) -> DVector<f64> {
    mattheij_q_for(t, 2.0)
}

pub fn lorenz_f(x: &DVector<f64>, _t: f64, beta: &DVector<f64>) -> DVector<f64> {
    DVector::from_vec(vec![
        beta[0] * (x[1] - x[0]),
        x[0] * (beta[1] - x[2]) - x[1],
        x[0] * x[1] - beta[2] * x[2],
    ])
}

pub fn lorenz_dfdx(x: &DVector<f64>, _t: f64, beta: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_row_slice(
        3,
        3,
        &[
            -beta[0], beta[0], 0.0, //
            beta[1] - x[2], -1.0, -x[0], //
            x[1], x[0], -beta[2],
        ],
    )
}

/// df/dsigma
pub fn lorenz_dfdsigma(x: &DVector<f64>, _t: f64, _beta: &DVector<f64>) -> DVector<f64> {
    DVector::from_vec(vec![x[1] - x[0], 0.0, 0.0])
}

/// df/drho
pub fn lorenz_dfdrho(x: &DVector<f64>, _t: f64, _beta: &DVector<f64>) -> DVector<f64> {
    DVector::from_vec(vec![0.0, x[0], 0.0])
}

/// df/dbeta
pub fn lorenz_dfdbeta(x: &DVector<f64>, _t: f64, _beta: &DVector<f64>) -> DVector<f64> {
    DVector::from_vec(vec![0.0, 0.0, -x[2]])
}

impl TestProblem {
    pub fn ode(&self) -> ODESpec {
        match self {
            TestProblem::Mattheij => linear_ode(3, 2, Rc::new(mattheij_a), Rc::new(mattheij_q)),
            TestProblem::MattheijEasy => {
                linear_ode(3, 2, Rc::new(mattheij_a), Rc::new(mattheij_easy_q))
            }
            TestProblem::Lorenz => {
                let f: RhsFn = Box::new(lorenz_f);
                let dfdx: JacFn = Box::new(lorenz_dfdx);
                let dfdsigma: ParamJacFn = Box::new(lorenz_dfdsigma);
                let dfdrho: ParamJacFn = Box::new(lorenz_dfdrho);
                let dfdbeta: ParamJacFn = Box::new(lorenz_dfdbeta);
                ODESpec::with_dfdbeta(3, f, dfdx, vec![dfdsigma, dfdrho, dfdbeta])
            }
        }
    }

    /// parameter vector as a Q x 1 matrix
    pub fn beta(&self) -> DMatrix<f64> {
        match self {
            TestProblem::Mattheij => DMatrix::from_column_slice(2, 1, &[19.0, 2.0]),
            TestProblem::MattheijEasy => DMatrix::from_column_slice(2, 1, &[2.0, 2.0]),
            TestProblem::Lorenz => DMatrix::from_column_slice(3, 1, &[10.0, 28.0, 8.0 / 3.0]),
        }
    }

    /// (B0, B1). Mattheij: x1(0), x2(1) and sin(1) x1(1) + cos(1) x3(1) are prescribed;
    /// Lorenz: the initial state is prescribed
    pub fn boundary_matrices(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        match self {
            TestProblem::Mattheij | TestProblem::MattheijEasy => {
                let mut b0 = DMatrix::zeros(3, 3);
                b0[(0, 0)] = 1.0;
                let mut b1 = DMatrix::zeros(3, 3);
                b1[(1, 1)] = 1.0;
                b1[(2, 0)] = 1.0f64.sin();
                b1[(2, 2)] = 1.0f64.cos();
                (b0, b1)
            }
            TestProblem::Lorenz => (DMatrix::identity(3, 3), DMatrix::zeros(3, 3)),
        }
    }

    pub fn exact_solution(&self, t: f64) -> Option<DMatrix<f64>> {
        match self {
            TestProblem::Mattheij | TestProblem::MattheijEasy => {
                Some(DMatrix::from_element(3, 1, t.exp()))
            }
            TestProblem::Lorenz => None,
        }
    }

    pub fn span(&self) -> (f64, f64) {
        match self {
            TestProblem::Mattheij | TestProblem::MattheijEasy => (0.0, 1.0),
            TestProblem::Lorenz => (0.0, 3.0),
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            TestProblem::Mattheij | TestProblem::MattheijEasy => {
                vec!["x1".to_string(), "x2".to_string(), "x3".to_string()]
            }
            TestProblem::Lorenz => vec!["x".to_string(), "y".to_string(), "z".to_string()],
        }
    }

    /// b = B0 x(t0) + B1 x(t_end) for problems with a known solution
    pub fn boundary_value(&self) -> Option<DMatrix<f64>> {
        let (t0, t_end) = self.span();
        let (b0, b1) = self.boundary_matrices();
        let x0 = self.exact_solution(t0)?;
        let x_end = self.exact_solution(t_end)?;
        Some(&b0 * x0 + &b1 * x_end)
    }
}

/// uniform mesh of n points over [start, end]
pub fn uniform_mesh(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start; n];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + i as f64 * step).collect()
}
