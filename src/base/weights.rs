//! Fitness weights: fold a raw fitness vector into one maximized scalar.

use crate::error::{OptimError, Result};
use serde::{Deserialize, Serialize};

/// Fixed per-dimension multipliers applied to raw fitness before any
/// comparison.
///
/// After weighting, the optimizer always *maximizes*. A minimization
/// objective uses a negative weight, e.g. `(-1.0,)`. Weights are set once at
/// construction and never mutated.
///
/// # Examples
///
/// ```
/// use u_blackopt::base::FitnessWeights;
///
/// let w = FitnessWeights::new(vec![-1.0]).unwrap();
/// assert_eq!(w.apply(&[3.0]).unwrap(), -3.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FitnessWeights(Vec<f64>);

impl FitnessWeights {
    /// Creates weights, rejecting empty, zero, or non-finite entries.
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(OptimError::Configuration(
                "fitness weights must not be empty".into(),
            ));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w == 0.0) {
            return Err(OptimError::Configuration(format!(
                "fitness weights must be finite and non-zero, got {w}"
            )));
        }
        Ok(Self(weights))
    }

    /// Single-objective minimization.
    pub fn minimize() -> Self {
        Self(vec![-1.0])
    }

    /// Single-objective maximization.
    pub fn maximize() -> Self {
        Self(vec![1.0])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Dot product of the raw fitness with the weights.
    ///
    /// Fails if the fitness dimension differs from the weight dimension.
    pub fn apply(&self, raw: &[f64]) -> Result<f64> {
        if raw.len() != self.0.len() {
            return Err(OptimError::Configuration(format!(
                "fitness has {} dimension(s) but {} weight(s) are configured",
                raw.len(),
                self.0.len()
            )));
        }
        Ok(raw.iter().zip(&self.0).map(|(f, w)| f * w).sum())
    }
}
