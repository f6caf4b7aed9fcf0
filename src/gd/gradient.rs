//! Finite-difference gradient estimation.

use crate::error::{OptimError, Result};
use nalgebra::{DMatrix, DVector};

/// Least-squares gradient from perturbed evaluations.
///
/// Solves `dx * g ≈ dy` in the minimum-norm least-squares sense, where row
/// `i` of `dx` is `x_i - centroid` and `dy_i = f_i - f_centroid`. With fewer
/// samples than dimensions the minimum-norm solution is returned.
pub fn estimate_gradient(
    centroid: &[f64],
    centroid_fitness: f64,
    samples: &[(&[f64], f64)],
) -> Result<Vec<f64>> {
    let dim = centroid.len();
    if samples.is_empty() {
        return Err(OptimError::Configuration(
            "gradient estimate needs at least one perturbed sample".into(),
        ));
    }

    let mut dx = DMatrix::<f64>::zeros(samples.len(), dim);
    let mut dy = DVector::<f64>::zeros(samples.len());
    for (row, (x, f)) in samples.iter().enumerate() {
        if x.len() != dim {
            return Err(OptimError::Configuration(format!(
                "sample has {} dimension(s), centroid has {dim}",
                x.len()
            )));
        }
        for (col, (xi, ci)) in x.iter().zip(centroid).enumerate() {
            dx[(row, col)] = xi - ci;
        }
        dy[row] = f - centroid_fitness;
    }

    if dx.iter().all(|v| *v == 0.0) {
        return Ok(vec![0.0; dim]);
    }

    let svd = dx.svd(true, true);
    let g = svd
        .solve(&dy, 1e-12)
        .map_err(|e| OptimError::Configuration(format!("gradient solve failed: {e}")))?;
    Ok(g.iter().copied().collect())
}
