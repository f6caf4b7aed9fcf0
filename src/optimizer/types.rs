//! Optimizer lifecycle and reporting types.

use crate::base::{Individual, RunId, StopReason};
use serde::{Deserialize, Serialize};

/// Lifecycle of an [`Optimizer`](super::Optimizer).
///
/// `Initialized -> Running -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Constructed; the first generation is out for evaluation.
    Initialized,
    Running,
    Stopped,
}

/// Summary of one processed generation, as forwarded to the trajectory
/// store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    pub pop_size: usize,
    pub first_run_id: RunId,
    pub best_fitness_in_run: f64,
    pub average_fitness_in_run: f64,

    /// Weighted fitness of the centroid when the strategy evaluates it.
    pub current_individual_fitness: Option<f64>,

    pub failed_runs: usize,
    pub learning_rate: f64,
    pub exploration: f64,
}

/// The best individual seen so far and its weighted fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSoFar {
    pub individual: Individual,
    pub fitness: f64,
    pub generation: usize,
}

/// Final statistics produced by [`Optimizer::end`](super::Optimizer::end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSummary {
    pub optimizer: String,
    pub generations: usize,
    pub total_runs: usize,
    pub failed_runs: usize,
    pub best: Option<BestSoFar>,
    pub final_centroid: Vec<f64>,
    pub stop_reason: Option<StopReason>,
}
