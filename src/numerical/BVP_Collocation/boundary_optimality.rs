//! Boundary matrices that make the condensed boundary system as well conditioned as possible.
//!
//! After the forward sweep the only row block still coupling the end points is
//! M = [B_last | D_last] acting on (delta_{N-1}, delta_0). Taking the rows of [B1 | B0] as an
//! orthonormal basis of the orthogonal complement of the rows of M turns the 2P x 2P
//! condensed matrix [M; B1 B0] into one with orthogonal row blocks.
use crate::numerical::BVP_Collocation::BVP_errors::BvpError;
use crate::numerical::BVP_Collocation::BVP_problem::BVPProblem;
use crate::numerical::BVP_Collocation::block_elimination::{BlockFactorization, forward_eliminate};
use crate::numerical::BVP_Collocation::constraint_evaluator::constraint_matrix_blocks;
use log::info;
use nalgebra::DMatrix;

/// (B0, B1) whose stacked rows [B1 | B0] are orthonormal and orthogonal to the rows of [B_last | D_last]
pub fn optimal_boundary_matrices(
    factorization: &BlockFactorization,
) -> Result<(DMatrix<f64>, DMatrix<f64>), BvpError> {
    let p = factorization.p;
    let mut m = DMatrix::zeros(p, 2 * p);
    m.view_mut((0, 0), (p, p)).copy_from(&factorization.b_last);
    m.view_mut((0, p), (p, p))
        .copy_from(&factorization.d[factorization.n - 2]);

    let q = m.transpose().qr().q();
    let projector = DMatrix::<f64>::identity(2 * p, 2 * p) - &q * q.transpose();
    let eigen = projector.symmetric_eigen();
    let mut order: Vec<usize> = (0..2 * p).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));
    let smallest_kept = eigen.eigenvalues[order[p - 1]];
    if smallest_kept < 0.5 {
        return Err(BvpError::SingularMatrix {
            context: "complement of the condensed boundary row".to_string(),
        });
    }

    let w = DMatrix::from_fn(p, 2 * p, |row, col| eigen.eigenvectors[(col, order[row])]);
    let b1 = w.columns(0, p).into_owned();
    let b0 = w.columns(p, p).into_owned();
    Ok((b0, b1))
}

impl BVPProblem {
    /// Replaces B0, B1 by the optimal boundary matrices for the current trajectory and resets
    /// b = B0 X[0] + B1 X[N-1], so the trajectory keeps satisfying the boundary condition
    pub fn set_optimal_boundary_matrices(&mut self) -> Result<(), BvpError> {
        let (a, b) = constraint_matrix_blocks(&*self, &self.trajectory)?;
        let factorization = forward_eliminate(&a, &b)?;
        let (b0, b1) = optimal_boundary_matrices(&factorization)?;
        self.b = &b0 * &self.trajectory[0] + &b1 * &self.trajectory[self.n - 1];
        self.b0 = b0;
        self.b1 = b1;
        info!("boundary matrices replaced by the optimal ones, b = {}", self.b.transpose());
        Ok(())
    }
}
