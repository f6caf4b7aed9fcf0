//! Result types for the driving loop.

use crate::optimizer::OptimizerSummary;

/// Outcome of [`Experiment::run`](super::Experiment::run).
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub summary: OptimizerSummary,

    /// Generations processed by this call (a resumed loop counts only its
    /// own).
    pub generations_run: usize,

    /// Runs sent out again after they went missing or failed.
    pub redispatched_runs: usize,

    /// Runs penalized because they never reported.
    pub timed_out_runs: usize,

    /// Whether the run was cancelled externally.
    pub cancelled: bool,
}
