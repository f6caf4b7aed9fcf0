//! Shared data model: individuals, run identities, and fitness outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

/// Identity of one evaluation.
///
/// Run-ids are assigned by the optimizer and grow monotonically across
/// generations, so a flat stream of run-ids can be mapped back to
/// generations using the per-generation pop sizes.
pub type RunId = usize;

/// One generation's worth of individuals, keyed by run-id.
pub type Population = BTreeMap<RunId, Individual>;

/// A candidate point in the optimizee's parameter space.
///
/// Individuals are immutable once constructed; strategies build new ones
/// rather than editing dispatched ones.
///
/// # Examples
///
/// ```
/// use u_blackopt::base::Individual;
///
/// let ind = Individual::new(vec![1.0, -2.0]);
/// assert_eq!(ind.dim(), 2);
/// assert_eq!(ind[1], -2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Individual(Vec<f64>);

impl Individual {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Number of parameters.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Returns `true` if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Deref for Individual {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for Individual {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Result of evaluating one run.
///
/// A failed evaluation is a value, not an error: the optimizer replaces it
/// with the configured worst fitness so it never wins selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FitnessOutcome {
    /// Raw fitness vector, one entry per objective dimension.
    Evaluated(Vec<f64>),

    /// The evaluation crashed or returned garbage.
    Failed(String),
}

impl FitnessOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FitnessOutcome::Failed(_))
    }

    /// Returns the raw fitness vector if the run succeeded.
    pub fn values(&self) -> Option<&[f64]> {
        match self {
            FitnessOutcome::Evaluated(v) => Some(v),
            FitnessOutcome::Failed(_) => None,
        }
    }
}
