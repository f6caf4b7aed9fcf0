//! Serializable optimizer state.

use super::config::OptimizerConfig;
use super::strategy::Strategy;
use super::types::{BestSoFar, GenerationRecord, OptimizerSummary, Phase};
use crate::base::{FitnessWeights, OptimRng, Population, RunId, StopReason};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything an [`Optimizer`](super::Optimizer) needs to continue a run
/// bit-identically: generation counter, centroid and moment buffers, RNG
/// state, best-so-far, pending population, and per-generation history.
///
/// The bounding function is code, not data, and is re-attached on
/// [`Optimizer::resume`](super::Optimizer::resume).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub config: OptimizerConfig,
    pub weights: FitnessWeights,
    pub strategy: Strategy,
    pub rng: OptimRng,
    pub phase: Phase,
    pub generation: usize,
    pub next_run_id: RunId,
    pub pending: Population,
    pub best: Option<BestSoFar>,
    pub history: Vec<GenerationRecord>,
    pub failed_runs: usize,
    pub stop_reason: Option<StopReason>,
    pub summary: Option<OptimizerSummary>,
}

impl Checkpoint {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the checkpoint atomically (temp file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Per-generation pop sizes, in generation order.
    pub fn pop_sizes(&self) -> Vec<usize> {
        self.history.iter().map(|r| r.pop_size).collect()
    }
}
