//! Sensitivity of the solution to the boundary value b.
//!
//! Two components of b are swept over a (2 resolution + 1) x (2 resolution + 1) grid. Every grid
//! point is solved again from the reference solution, and the distance of the new solution from
//! the reference one is measured through an output operator O:
//!     cost = sum_t |y_t - O X_t|^2 / (2 N),   y_t = O X_t of the reference solution
use crate::numerical::BVP_Collocation::BVP_errors::{BvpError, check_shape};
use crate::numerical::BVP_Collocation::BVP_problem::BVPProblem;
use csv::Writer;
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use std::fs::File;
use std::path::Path;

/// Component `index` of b takes 2 resolution + 1 equally spaced values from `start` to `end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySweep {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl BoundarySweep {
    pub fn new(index: usize, start: f64, end: f64) -> BoundarySweep {
        BoundarySweep { index, start, end }
    }

    fn values(&self, resolution: usize) -> DVector<f64> {
        if resolution == 0 {
            return DVector::from_element(1, 0.5 * (self.start + self.end));
        }
        let m = 2 * resolution + 1;
        DVector::from_fn(m, |i, _| {
            self.start + (self.end - self.start) * i as f64 / (2 * resolution) as f64
        })
    }
}

#[derive(Debug, Clone)]
pub struct CostSurface {
    pub b1_values: DVector<f64>,
    pub b2_values: DVector<f64>,
    /// cost[(j, i)] belongs to b1_values[i], b2_values[j]; NaN where the solve failed
    pub cost: DMatrix<f64>,
}

impl CostSurface {
    /// csv with the b1 values in the header row and one row `b2, costs...` per b2 value
    pub fn save_to_csv<P: AsRef<Path>>(&self, filename: P) -> Result<(), BvpError> {
        let file = File::create(filename)?;
        let mut writer = Writer::from_writer(file);
        let mut header = Vec::with_capacity(self.b1_values.len() + 1);
        header.push("b2\\b1".to_string());
        header.extend(self.b1_values.iter().map(|v| v.to_string()));
        writer.write_record(&header)?;
        for (j, b2) in self.b2_values.iter().enumerate() {
            let mut row = Vec::with_capacity(self.b1_values.len() + 1);
            row.push(b2.to_string());
            row.extend(self.cost.row(j).iter().map(|v| v.to_string()));
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Grid offsets (d1, d2) in [-resolution, resolution]^2 ordered in square shells around (0, 0),
/// every offset a unit step away from the previous one
pub fn spiral_offsets(resolution: usize) -> Vec<(isize, isize)> {
    let r = resolution as isize;
    let mut offsets = Vec::with_capacity((2 * resolution + 1).pow(2));
    offsets.push((0, 0));
    for shell in 1..=r {
        for d2 in (-shell + 1)..=shell {
            offsets.push((shell, d2));
        }
        for d1 in (-shell..shell).rev() {
            offsets.push((d1, shell));
        }
        for d2 in (-shell..shell).rev() {
            offsets.push((-shell, d2));
        }
        for d1 in (-shell + 1)..=shell {
            offsets.push((d1, -shell));
        }
    }
    offsets
}

fn output_cost(output: &DMatrix<f64>, observed: &[DVector<f64>], trajectory: &[DVector<f64>]) -> f64 {
    let n = trajectory.len() as f64;
    let sum: f64 = observed
        .iter()
        .zip(trajectory.iter())
        .map(|(y, x)| (y - output * x).norm_squared())
        .sum();
    sum / (2.0 * n)
}

impl BVPProblem {
    fn check_sweep(&self, sweep: &BoundarySweep) -> Result<(), BvpError> {
        let p = self.p();
        if sweep.index >= p {
            return Err(BvpError::dimension("b index", (p, 1), (sweep.index + 1, 1)));
        }
        Ok(())
    }

    /// Solves the problem, then re-solves it for every grid point of the two swept components of
    /// b, starting each time from the reference solution. Grid points are visited in spiral order
    /// from the centre. A grid point whose solve does not converge (or hits a singular system)
    /// gets cost NaN. Afterwards b and the trajectory are those of the reference solution.
    pub fn cost_surface_b(
        &mut self,
        output: &DMatrix<f64>,
        resolution: usize,
        first: BoundarySweep,
        second: BoundarySweep,
    ) -> Result<CostSurface, BvpError> {
        let p = self.p();
        check_shape("O", (output.nrows(), p), output.shape())?;
        self.check_sweep(&first)?;
        self.check_sweep(&second)?;

        self.solve()?;
        let reference: Vec<DMatrix<f64>> = self
            .trajectory()
            .iter()
            .map(|x| DMatrix::from_column_slice(p, 1, x.as_slice()))
            .collect();
        let observed: Vec<DVector<f64>> = self.trajectory().iter().map(|x| output * x).collect();
        let reference_b = DMatrix::from_column_slice(p, 1, self.b().as_slice());

        let b1_values = first.values(resolution);
        let b2_values = second.values(resolution);
        let m = b1_values.len();
        let mut cost = DMatrix::from_element(m, m, f64::NAN);
        let r = resolution as isize;

        let mut outcome = Ok(());
        for (k, (d1, d2)) in spiral_offsets(resolution).into_iter().enumerate() {
            let i = (d1 + r) as usize;
            let j = (d2 + r) as usize;
            let mut b = reference_b.clone();
            b[first.index] = b1_values[i];
            b[second.index] = b2_values[j];
            self.set_boundary_value(b)?;
            self.set_trajectory(reference.clone())?;
            match self.solve() {
                Ok(_) => {
                    cost[(j, i)] = output_cost(output, &observed, self.trajectory());
                }
                Err(
                    e @ (BvpError::Converge { .. }
                    | BvpError::SingularMatrix { .. }
                    | BvpError::SingularPivot { .. }),
                ) => {
                    warn!("grid point ({}, {}) not solved: {}", d1, d2, e);
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
            info!(
                "grid point {} of {}: offset ({}, {}), cost = {:e}",
                k + 1,
                m * m,
                d1,
                d2,
                cost[(j, i)]
            );
        }

        self.set_boundary_value(reference_b)?;
        self.set_trajectory(reference)?;
        outcome?;
        Ok(CostSurface {
            b1_values,
            b2_values,
            cost,
        })
    }
}
