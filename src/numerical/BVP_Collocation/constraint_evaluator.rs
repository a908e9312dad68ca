//! Residual and Jacobian blocks of the trapezoidal discretization.
//!
//! For i = 1..N-1 with h_i = T[i] - T[i-1]
//!     r[i-1] = (X[i] - X[i-1]) - h_i/2 (f(X[i-1], T[i-1]) + f(X[i], T[i]))
//!     A[i-1] = dr[i-1]/dX[i-1] = -I - h_i/2 dfdx(X[i-1], T[i-1])
//!     B[i-1] = dr[i-1]/dX[i]   =  I - h_i/2 dfdx(X[i], T[i])
//! and the boundary block r[N-1] = B0 X[0] + B1 X[N-1] - b.
use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use crate::numerical::BVP_Collocation::BVP_problem::BVPProblem;
use nalgebra::{DMatrix, DVector};

/// Residual and Jacobian blocks evaluated on one trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintBlocks {
    pub residual: Vec<DVector<f64>>, // N blocks, the last one is the boundary residual
    pub a: Vec<DMatrix<f64>>,        // N-1 blocks
    pub b: Vec<DMatrix<f64>>,        // N-1 blocks
}

impl ConstraintBlocks {
    /// residual and Jacobian blocks of `problem` evaluated on the trajectory `x`
    pub fn evaluate(problem: &BVPProblem, x: &[DVector<f64>]) -> Result<ConstraintBlocks, BvpError> {
        let residual = constraint_vector_blocks(problem, x)?;
        let (a, b) = constraint_matrix_blocks(problem, x)?;
        Ok(ConstraintBlocks { residual, a, b })
    }

    pub fn cost(&self) -> f64 {
        sum_of_squares(&self.residual)
    }
}

fn check_trajectory_length(problem: &BVPProblem, x: &[DVector<f64>]) -> Result<(), BvpError> {
    check_shape("trajectory", (problem.p(), problem.n()), (problem.p(), x.len()))
}

/// residual blocks r[0..N-1]
pub fn constraint_vector_blocks(
    problem: &BVPProblem,
    x: &[DVector<f64>],
) -> Result<Vec<DVector<f64>>, BvpError> {
    check_trajectory_length(problem, x)?;
    let n = problem.n();
    let t = problem.mesh();
    let beta = problem.beta();
    let ode = problem.ode();
    let mut constraint = Vec::with_capacity(n);

    // f is evaluated once per mesh point, the value at X[i] is reused for block i
    let mut f_now = ode.evaluate(&x[0], t[0], beta)?;
    for i in 1..n {
        let f_before = f_now;
        f_now = ode.evaluate(&x[i], t[i], beta)?;
        let h = t[i] - t[i - 1];
        constraint.push((&x[i] - &x[i - 1]) - (&f_before + &f_now) * (h / 2.0));
    }
    constraint.push(problem.b0() * &x[0] + problem.b1() * &x[n - 1] - problem.b());
    Ok(constraint)
}

/// Jacobian blocks A[0..N-2], B[0..N-2]
pub fn constraint_matrix_blocks(
    problem: &BVPProblem,
    x: &[DVector<f64>],
) -> Result<(Vec<DMatrix<f64>>, Vec<DMatrix<f64>>), BvpError> {
    check_trajectory_length(problem, x)?;
    let n = problem.n();
    let p = problem.p();
    let t = problem.mesh();
    let beta = problem.beta();
    let ode = problem.ode();
    let eye = DMatrix::<f64>::identity(p, p);
    let mut a = Vec::with_capacity(n - 1);
    let mut b = Vec::with_capacity(n - 1);

    let mut dfdx_now = ode.jacobian(&x[0], t[0], beta)?;
    for i in 1..n {
        let dfdx_before = dfdx_now;
        dfdx_now = ode.jacobian(&x[i], t[i], beta)?;
        let half_h = (t[i] - t[i - 1]) / 2.0;
        a.push(-&eye - dfdx_before * half_h);
        b.push(&eye - &dfdx_now * half_h);
    }
    Ok((a, b))
}

/// Stacked residual vector of length N*P
pub fn constraint_vector(problem: &BVPProblem, x: &[DVector<f64>]) -> Result<DVector<f64>, BvpError> {
    let blocks = constraint_vector_blocks(problem, x)?;
    let p = problem.p();
    let mut stacked = DVector::zeros(problem.n() * p);
    for (i, block) in blocks.iter().enumerate() {
        stacked.rows_mut(i * p, p).copy_from(block);
    }
    Ok(stacked)
}

/// Full (N*P) x (N*P) Jacobian: collocation block rows first, boundary block row last.
/// Only meant for diagnostics and as a dense reference for small N.
pub fn constraint_matrix(problem: &BVPProblem, x: &[DVector<f64>]) -> Result<DMatrix<f64>, BvpError> {
    let (a, b) = constraint_matrix_blocks(problem, x)?;
    Ok(assemble_dense(&a, &b, problem.b0(), problem.b1()))
}

/// Dense matrix of the block-bidiagonal system with the boundary row block
///  [ A0 B0'                ]
///  [    A1  B1'            ]
///  [         ...           ]
///  [             A_{N-2} B_{N-2}' ]
///  [ B0                  B1 ]
pub fn assemble_dense(
    a: &[DMatrix<f64>],
    b: &[DMatrix<f64>],
    b0: &DMatrix<f64>,
    b1: &DMatrix<f64>,
) -> DMatrix<f64> {
    let p = b0.nrows();
    let n = a.len() + 1;
    let mut dense = DMatrix::zeros(n * p, n * p);
    for i in 0..n - 1 {
        dense.view_mut((i * p, i * p), (p, p)).copy_from(&a[i]);
        dense.view_mut((i * p, (i + 1) * p), (p, p)).copy_from(&b[i]);
    }
    dense.view_mut(((n - 1) * p, 0), (p, p)).copy_from(b0);
    dense.view_mut(((n - 1) * p, (n - 1) * p), (p, p)).copy_from(b1);
    dense
}

/// sum of squares of all entries of all blocks
pub fn sum_of_squares(blocks: &[DVector<f64>]) -> f64 {
    blocks.iter().map(|block| block.norm_squared()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::Examples_and_utils::TestProblem;
    use approx::assert_relative_eq;

    fn mattheij_bvp(n: usize) -> BVPProblem {
        let problem = TestProblem::Mattheij;
        let mesh: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let guess: Vec<DMatrix<f64>> = mesh
            .iter()
            .map(|t| problem.exact_solution(*t).unwrap())
            .collect();
        let (b0, b1) = problem.boundary_matrices();
        let b = &b0 * &guess[0] + &b1 * &guess[n - 1];
        BVPProblem::new(problem.ode(), mesh, guess, b0, b1, problem.beta(), b).unwrap()
    }

    #[test]
    fn test_constraint_vector_small_on_solution() {
        let n = 1001;
        let mut bvp = mattheij_bvp(n);
        let x = bvp.trajectory().to_vec();
        let residual = constraint_vector(&bvp, &x).unwrap();
        assert_eq!(residual.len(), 3 * n);
        assert!(residual.amax() < 1e-2);

        bvp.set_trajectory(vec![DMatrix::from_element(3, 1, 340.0); n]).unwrap();
        let x = bvp.trajectory().to_vec();
        let residual = constraint_vector(&bvp, &x).unwrap();
        assert!(residual.amax() > 1e-2);
    }

    #[test]
    fn test_constraint_matrix_blocks_shapes() {
        let n = 11;
        let bvp = mattheij_bvp(n);
        let (a, b) = constraint_matrix_blocks(&bvp, bvp.trajectory()).unwrap();
        assert_eq!(a.len(), n - 1);
        assert_eq!(b.len(), n - 1);
        for i in 0..n - 1 {
            assert_eq!(a[i].shape(), (3, 3));
            assert_eq!(b[i].shape(), (3, 3));
        }
        let residual = constraint_vector_blocks(&bvp, bvp.trajectory()).unwrap();
        assert_eq!(residual.len(), n);
        assert!(residual.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn test_blocks_formula() {
        let n = 5;
        let bvp = mattheij_bvp(n);
        let x = bvp.trajectory();
        let (a, b) = constraint_matrix_blocks(&bvp, x).unwrap();
        let h = bvp.mesh()[2] - bvp.mesh()[1];
        let dfdx1 = bvp.ode().jacobian(&x[1], bvp.mesh()[1], bvp.beta()).unwrap();
        let dfdx2 = bvp.ode().jacobian(&x[2], bvp.mesh()[2], bvp.beta()).unwrap();
        let eye = DMatrix::<f64>::identity(3, 3);
        assert!((&a[1] - (-&eye - &dfdx1 * (h / 2.0))).norm() < 1e-14);
        assert!((&b[1] - (&eye - &dfdx2 * (h / 2.0))).norm() < 1e-14);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let bvp = mattheij_bvp(21);
        let first = ConstraintBlocks::evaluate(&bvp, bvp.trajectory()).unwrap();
        let second = ConstraintBlocks::evaluate(&bvp, bvp.trajectory()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dense_jacobian_matches_finite_differences() {
        let n = 6;
        let problem = TestProblem::Lorenz;
        let mesh: Vec<f64> = (0..n).map(|i| 0.1 * i as f64).collect();
        let guess: Vec<DMatrix<f64>> = (0..n)
            .map(|i| DMatrix::from_column_slice(3, 1, &[1.0 + 0.1 * i as f64, 2.0, 20.0 - i as f64]))
            .collect();
        let (b0, b1) = problem.boundary_matrices();
        let bvp = BVPProblem::new(
            problem.ode(),
            mesh,
            guess,
            b0,
            b1,
            problem.beta(),
            DMatrix::zeros(3, 1),
        )
        .unwrap();
        let x = bvp.trajectory().to_vec();
        let jac = constraint_matrix(&bvp, &x).unwrap();
        let r0 = constraint_vector(&bvp, &x).unwrap();
        let eps = 1e-7;
        for i in 0..n {
            for j in 0..3 {
                let mut xp = x.clone();
                xp[i][j] += eps;
                let rp = constraint_vector(&bvp, &xp).unwrap();
                let column = (rp - &r0) / eps;
                for row in 0..3 * n {
                    assert_relative_eq!(column[row], jac[(row, 3 * i + j)], epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_wrong_trajectory_length() {
        let bvp = mattheij_bvp(11);
        let short = bvp.trajectory()[..5].to_vec();
        assert!(matches!(
            constraint_vector_blocks(&bvp, &short),
            Err(BvpError::Dimension(_))
        ));
    }
}
