//! Solver for the linearized collocation system J * delta = r where
//!
//!  [ A_0  B_0                          ] [ delta_0     ]   [ r_0     ]
//!  [      A_1  B_1                     ] [ delta_1     ]   [ r_1     ]
//!  [             ...                   ] [   ...       ] = [  ...    ]
//!  [              A_{N-2}  B_{N-2}     ] [ delta_{N-2} ]   [ r_{N-2} ]
//!  [ B0                    B1          ] [ delta_{N-1} ]   [ r_{N-1} ]
//!
//! The interior unknowns are eliminated one block column at a time by orthogonal (Householder)
//! transformations of two neighbouring block rows, so the work is O(N P^3) and nothing grows like
//! it does with plain compactification for unstable modes:
//! 1) `forward_eliminate` - QR of the stacked block column [B_cur; A_{i+1}]; produces the upper
//!    triangular blocks R_i (pivots U_i on the diagonal), the fill-ins C_i (coupling to delta_{i+2})
//!    and D_i (coupling to delta_0), and finally the reduced row [B_last | D_last];
//! 2) `transform_rhs` - replays the same reflections on the residual blocks;
//! 3) `condense_boundary` - solves the dense 2P x 2P system of the reduced row and the boundary row
//!    for delta_{N-1} and delta_0;
//! 4) `back_substitute` - recovers delta_{N-2}, ..., delta_1.
use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use log::debug;
use nalgebra::{DMatrix, DVector};

/// Householder-type reflection P = beta v v^T - I acting on the trailing rows of a stacked block column.
/// Chosen so that P x = sign(x_0) ||x|| e_1 for the column x it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflector {
    pub v: DVector<f64>,
    pub beta: f64,
}

impl Reflector {
    /// Builds the reflection for column `x`; None if x == 0 (zero pivot)
    fn from_column(x: &DVector<f64>) -> Option<(Reflector, f64)> {
        let sigma = x.norm();
        if sigma == 0.0 {
            return None;
        }
        let x0 = x[0];
        let s = if x0 < 0.0 { -1.0 } else { 1.0 };
        let mut v = x.clone();
        v[0] += s * sigma;
        // 2 / (v^T v)
        let beta = 1.0 / (sigma * (sigma + x0.abs()));
        Some((Reflector { v, beta }, s * sigma))
    }

    fn apply_to_vector(&self, offset: usize, y: &mut DVector<f64>) {
        let len = self.v.len();
        let s: f64 = (0..len).map(|k| self.v[k] * y[offset + k]).sum();
        let scale = self.beta * s;
        for k in 0..len {
            y[offset + k] = scale * self.v[k] - y[offset + k];
        }
    }

    fn apply_to_matrix(&self, offset: usize, w: &mut DMatrix<f64>) {
        let len = self.v.len();
        for col in 0..w.ncols() {
            let s: f64 = (0..len).map(|k| self.v[k] * w[(offset + k, col)]).sum();
            let scale = self.beta * s;
            for k in 0..len {
                w[(offset + k, col)] = scale * self.v[k] - w[(offset + k, col)];
            }
        }
    }
}

/// Everything the forward sweep produces. For a mesh of N points there are N-2 eliminated block
/// columns (index i eliminates delta_{i+1}).
#[derive(Debug, Clone)]
pub struct BlockFactorization {
    pub p: usize,
    pub n: usize,
    /// upper triangular blocks R_i with U_i on the diagonal, N-2 of them
    pub r: Vec<DMatrix<f64>>,
    /// pivots U_i, N-2 vectors of length P
    pub u: Vec<DVector<f64>>,
    /// fill-in coupling row block i to delta_{i+2}, N-2 of them
    pub c: Vec<DMatrix<f64>>,
    /// fill-in coupling to delta_0, N-1 of them; the last one belongs to the reduced row
    pub d: Vec<DMatrix<f64>>,
    /// reduced row block coupling to delta_{N-1}
    pub b_last: DMatrix<f64>,
    /// reflections of each elimination step, replayed on the right-hand side
    pub reflectors: Vec<Vec<Reflector>>,
}

/// Right-hand side after the reflections of the forward sweep
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRhs {
    /// right-hand sides of the triangular rows R_i, N-2 of them
    pub top: Vec<DVector<f64>>,
    /// right-hand side of the reduced row [B_last | D_last]
    pub reduced: DVector<f64>,
    /// boundary residual r_{N-1}, untouched
    pub boundary: DVector<f64>,
}

fn check_blocks(a: &[DMatrix<f64>], b: &[DMatrix<f64>]) -> Result<usize, BvpError> {
    if a.is_empty() {
        return Err(BvpError::dimension("A", (1, 1), (0, 0)));
    }
    let p = a[0].nrows();
    check_shape("B blocks count", (a.len(), 1), (b.len(), 1))?;
    for (ai, bi) in a.iter().zip(b.iter()) {
        check_shape("A", (p, p), ai.shape())?;
        check_shape("B", (p, p), bi.shape())?;
    }
    Ok(p)
}

/// Forward sweep over the Jacobian blocks A[0..N-2], B[0..N-2]
pub fn forward_eliminate(a: &[DMatrix<f64>], b: &[DMatrix<f64>]) -> Result<BlockFactorization, BvpError> {
    let p = check_blocks(a, b)?;
    let n = a.len() + 1;
    let steps = n - 2;
    let mut r = Vec::with_capacity(steps);
    let mut u = Vec::with_capacity(steps);
    let mut c = Vec::with_capacity(steps);
    let mut d = Vec::with_capacity(steps + 1);
    let mut reflectors = Vec::with_capacity(steps);

    let mut d_cur = a[0].clone();
    let mut b_cur = b[0].clone();
    for i in 0..steps {
        // columns: [delta_0 | delta_{i+1} | delta_{i+2}], rows: [current row block; row block i+1]
        let mut w = DMatrix::zeros(2 * p, 3 * p);
        w.view_mut((0, 0), (p, p)).copy_from(&d_cur);
        w.view_mut((0, p), (p, p)).copy_from(&b_cur);
        w.view_mut((p, p), (p, p)).copy_from(&a[i + 1]);
        w.view_mut((p, 2 * p), (p, p)).copy_from(&b[i + 1]);

        let mut pivots = DVector::zeros(p);
        let mut step_reflectors = Vec::with_capacity(p);
        for j in 0..p {
            let x = DVector::from_fn(2 * p - j, |k, _| w[(j + k, p + j)]);
            let (reflector, pivot) =
                Reflector::from_column(&x).ok_or(BvpError::SingularPivot { block: i, column: j })?;
            reflector.apply_to_matrix(j, &mut w);
            pivots[j] = pivot;
            step_reflectors.push(reflector);
        }

        let r_i = DMatrix::from_fn(p, p, |row, col| {
            if row == col {
                pivots[row]
            } else if row < col {
                w[(row, p + col)]
            } else {
                0.0
            }
        });
        r.push(r_i);
        u.push(pivots);
        d.push(w.view((0, 0), (p, p)).into_owned());
        c.push(w.view((0, 2 * p), (p, p)).into_owned());
        d_cur = w.view((p, 0), (p, p)).into_owned();
        b_cur = w.view((p, 2 * p), (p, p)).into_owned();
        reflectors.push(step_reflectors);
    }
    d.push(d_cur);
    debug!("forward elimination finished: {} block columns eliminated", steps);
    Ok(BlockFactorization {
        p,
        n,
        r,
        u,
        c,
        d,
        b_last: b_cur,
        reflectors,
    })
}

/// Applies the reflections of `factorization` to the residual blocks r[0..N-1]
pub fn transform_rhs(
    factorization: &BlockFactorization,
    residual: &[DVector<f64>],
) -> Result<TransformedRhs, BvpError> {
    let p = factorization.p;
    let n = factorization.n;
    check_shape("residual", (p, n), (p, residual.len()))?;
    for block in residual {
        check_shape("residual", (p, 1), block.shape())?;
    }
    let mut top = Vec::with_capacity(n - 2);
    let mut current = residual[0].clone();
    for (i, step_reflectors) in factorization.reflectors.iter().enumerate() {
        let mut y = DVector::zeros(2 * p);
        y.rows_mut(0, p).copy_from(&current);
        y.rows_mut(p, p).copy_from(&residual[i + 1]);
        for (j, reflector) in step_reflectors.iter().enumerate() {
            reflector.apply_to_vector(j, &mut y);
        }
        top.push(y.rows(0, p).into_owned());
        current = y.rows(p, p).into_owned();
    }
    Ok(TransformedRhs {
        top,
        reduced: current,
        boundary: residual[n - 1].clone(),
    })
}

/// Solves
///  [ B_last  D_last ] [ delta_{N-1} ]   [ reduced  ]
///  [ B1      B0     ] [ delta_0     ] = [ boundary ]
/// returns (delta_0, delta_{N-1})
pub fn condense_boundary(
    factorization: &BlockFactorization,
    b0: &DMatrix<f64>,
    b1: &DMatrix<f64>,
    rhs: &TransformedRhs,
) -> Result<(DVector<f64>, DVector<f64>), BvpError> {
    let p = factorization.p;
    check_shape("B0", (p, p), b0.shape())?;
    check_shape("B1", (p, p), b1.shape())?;
    let system = reduced_boundary_matrix(factorization, b0, b1);
    let mut c = DVector::zeros(2 * p);
    c.rows_mut(0, p).copy_from(&rhs.reduced);
    c.rows_mut(p, p).copy_from(&rhs.boundary);
    let solution = system.lu().solve(&c).ok_or_else(|| BvpError::SingularMatrix {
        context: "reduced boundary system".to_string(),
    })?;
    let delta_last = solution.rows(0, p).into_owned();
    let delta_first = solution.rows(p, p).into_owned();
    Ok((delta_first, delta_last))
}

/// The dense 2P x 2P matrix [[B_last, D_last], [B1, B0]]
pub fn reduced_boundary_matrix(
    factorization: &BlockFactorization,
    b0: &DMatrix<f64>,
    b1: &DMatrix<f64>,
) -> DMatrix<f64> {
    let p = factorization.p;
    let mut system = DMatrix::zeros(2 * p, 2 * p);
    system.view_mut((0, 0), (p, p)).copy_from(&factorization.b_last);
    system
        .view_mut((0, p), (p, p))
        .copy_from(&factorization.d[factorization.n - 2]);
    system.view_mut((p, 0), (p, p)).copy_from(b1);
    system.view_mut((p, p), (p, p)).copy_from(b0);
    system
}

/// Recovers the interior corrections from R_i delta_{i+1} = top_i - D_i delta_0 - C_i delta_{i+2},
/// sweeping i = N-3 down to 0
pub fn back_substitute(
    factorization: &BlockFactorization,
    rhs: &TransformedRhs,
    delta_first: DVector<f64>,
    delta_last: DVector<f64>,
) -> Vec<DVector<f64>> {
    let p = factorization.p;
    let n = factorization.n;
    let mut delta = vec![DVector::zeros(p); n];
    delta[0] = delta_first;
    delta[n - 1] = delta_last;
    for i in (0..n - 2).rev() {
        let y = &rhs.top[i] - &factorization.d[i] * &delta[0] - &factorization.c[i] * &delta[i + 2];
        let r_i = &factorization.r[i];
        let pivots = &factorization.u[i];
        let mut z = DVector::zeros(p);
        for row in (0..p).rev() {
            let mut acc = y[row];
            for col in row + 1..p {
                acc -= r_i[(row, col)] * z[col];
            }
            z[row] = acc / pivots[row];
        }
        delta[i + 1] = z;
    }
    delta
}

/// delta with J delta = r for the block-bidiagonal J given by (A, B, B0, B1)
pub fn solve_block_bidiagonal(
    a: &[DMatrix<f64>],
    b: &[DMatrix<f64>],
    b0: &DMatrix<f64>,
    b1: &DMatrix<f64>,
    residual: &[DVector<f64>],
) -> Result<Vec<DVector<f64>>, BvpError> {
    let factorization = forward_eliminate(a, b)?;
    let rhs = transform_rhs(&factorization, residual)?;
    let (delta_first, delta_last) = condense_boundary(&factorization, b0, b1, &rhs)?;
    Ok(back_substitute(&factorization, &rhs, delta_first, delta_last))
}
