//! The dispatcher contract.

use crate::base::{derive_seed, FitnessOutcome, Individual, Population, RunId};
use crate::optimizee::{EvalContext, Optimizee};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Results of one dispatch, keyed by run-id.
pub type DispatchResults = BTreeMap<RunId, FitnessOutcome>;

/// Read-only context lent to a dispatcher for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext {
    pub generation: usize,

    /// Base seed from which every run's evaluation seed is derived.
    pub base_seed: u64,
}

impl DispatchContext {
    pub fn new(generation: usize, base_seed: u64) -> Self {
        Self {
            generation,
            base_seed,
        }
    }

    /// Evaluation seed for one run.
    pub fn seed_for(&self, run_id: RunId) -> u64 {
        derive_seed(self.base_seed, self.generation, run_id)
    }
}

/// Whole-call dispatch failures.
///
/// A crash of one evaluation is not a `DispatchError`; it comes back as
/// [`FitnessOutcome::Failed`] for that run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Some runs did not report within the poll bound. Results of the runs
    /// that did report are preserved in `completed`.
    #[error("{} run(s) did not report in time: {missing:?}", .missing.len())]
    Timeout {
        completed: DispatchResults,
        missing: Vec<RunId>,
    },

    #[error("cannot dispatch an empty batch")]
    EmptyBatch,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes evaluations for a batch of individuals.
///
/// Implementations must return an outcome for every submitted run-id, or
/// fail the whole call. Runs may complete in any order; results are keyed
/// by run-id only.
pub trait Dispatcher {
    fn dispatch(
        &mut self,
        ctx: &DispatchContext,
        batch: &Population,
    ) -> Result<DispatchResults, DispatchError>;

    /// Gives up on runs of `ctx.generation` that will not be dispatched
    /// again, releasing whatever the transport holds for them.
    fn abandon(&mut self, ctx: &DispatchContext, run_ids: &[RunId]) -> Result<(), DispatchError> {
        let _ = (ctx, run_ids);
        Ok(())
    }
}

/// Runs one evaluation in-process, turning errors and panics into
/// [`FitnessOutcome::Failed`].
pub(crate) fn evaluate_one<O: Optimizee>(
    optimizee: &O,
    ctx: &DispatchContext,
    run_id: RunId,
    individual: &Individual,
) -> FitnessOutcome {
    evaluate_with_seed(optimizee, ctx.generation, run_id, ctx.seed_for(run_id), individual)
}

pub(crate) fn evaluate_with_seed<O: Optimizee>(
    optimizee: &O,
    generation: usize,
    run_id: RunId,
    seed: u64,
    individual: &Individual,
) -> FitnessOutcome {
    let eval = EvalContext {
        generation,
        run_id,
        seed,
        individual,
    };
    match panic::catch_unwind(AssertUnwindSafe(|| optimizee.simulate(&eval))) {
        Ok(Ok(values)) => FitnessOutcome::Evaluated(values),
        Ok(Err(reason)) => FitnessOutcome::Failed(reason),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            FitnessOutcome::Failed(format!("evaluation panicked: {message}"))
        }
    }
}
