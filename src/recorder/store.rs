//! Trajectory storage.

use crate::base::{FitnessOutcome, Individual, RunId};
use crate::error::Result;
use crate::optimizer::GenerationRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Receives per-run and per-generation records.
///
/// Writes are keyed by run-id, so records may arrive in any order. A
/// second record for the same run is ignored.
pub trait TrajectoryStore {
    fn store_run(
        &mut self,
        generation: usize,
        run_id: RunId,
        individual: &Individual,
        outcome: &FitnessOutcome,
    ) -> Result<()>;

    fn store_generation(&mut self, record: &GenerationRecord) -> Result<()>;

    /// Stores a named group of parameters (optimizer settings, optimizee
    /// settings, final summary).
    fn store_params(&mut self, group: &str, params: &Map<String, Value>) -> Result<()>;
}

/// One stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub generation: usize,
    pub individual: Individual,
    pub outcome: FitnessOutcome,
}

/// Keeps the whole trajectory in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryTrajectory {
    runs: BTreeMap<RunId, RunRecord>,
    generations: Vec<GenerationRecord>,
    params: BTreeMap<String, Map<String, Value>>,
}

impl InMemoryTrajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &BTreeMap<RunId, RunRecord> {
        &self.runs
    }

    pub fn run(&self, run_id: RunId) -> Option<&RunRecord> {
        self.runs.get(&run_id)
    }

    pub fn generations(&self) -> &[GenerationRecord] {
        &self.generations
    }

    pub fn params(&self, group: &str) -> Option<&Map<String, Value>> {
        self.params.get(group)
    }

    /// Runs of one generation, in run-id order.
    pub fn runs_in_generation(&self, generation: usize) -> impl Iterator<Item = (RunId, &RunRecord)> {
        self.runs
            .iter()
            .filter(move |(_, r)| r.generation == generation)
            .map(|(&id, r)| (id, r))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }
}

impl TrajectoryStore for InMemoryTrajectory {
    fn store_run(
        &mut self,
        generation: usize,
        run_id: RunId,
        individual: &Individual,
        outcome: &FitnessOutcome,
    ) -> Result<()> {
        if self.runs.contains_key(&run_id) {
            warn!(run_id, "duplicate run record ignored");
            return Ok(());
        }
        self.runs.insert(
            run_id,
            RunRecord {
                generation,
                individual: individual.clone(),
                outcome: outcome.clone(),
            },
        );
        Ok(())
    }

    fn store_generation(&mut self, record: &GenerationRecord) -> Result<()> {
        if self.generations.iter().any(|g| g.generation == record.generation) {
            warn!(generation = record.generation, "duplicate generation record ignored");
            return Ok(());
        }
        self.generations.push(record.clone());
        Ok(())
    }

    fn store_params(&mut self, group: &str, params: &Map<String, Value>) -> Result<()> {
        self.params.insert(group.to_string(), params.clone());
        Ok(())
    }
}

/// Maps each flat run index to its generation, given per-generation pop
/// sizes.
///
/// Run-ids are allocated contiguously across generations, so run `k` of a
/// trajectory belongs to the generation whose cumulative size first
/// exceeds `k`.
///
/// # Examples
///
/// ```
/// use u_blackopt::recorder::generation_of_runs;
///
/// assert_eq!(generation_of_runs(&[2, 3]), vec![0, 0, 1, 1, 1]);
/// ```
pub fn generation_of_runs(pop_sizes: &[usize]) -> Vec<usize> {
    pop_sizes
        .iter()
        .enumerate()
        .flat_map(|(generation, &size)| std::iter::repeat(generation).take(size))
        .collect()
}
