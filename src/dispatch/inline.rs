//! In-process dispatchers.

use super::types::{evaluate_one, DispatchContext, DispatchError, DispatchResults, Dispatcher};
use crate::base::Population;
use crate::optimizee::Optimizee;
use tracing::debug;

/// Evaluates every run sequentially on the calling thread.
#[derive(Debug, Clone)]
pub struct InlineDispatcher<O> {
    optimizee: O,
}

impl<O: Optimizee> InlineDispatcher<O> {
    pub fn new(optimizee: O) -> Self {
        Self { optimizee }
    }

    pub fn optimizee(&self) -> &O {
        &self.optimizee
    }
}

impl<O: Optimizee> Dispatcher for InlineDispatcher<O> {
    fn dispatch(
        &mut self,
        ctx: &DispatchContext,
        batch: &Population,
    ) -> Result<DispatchResults, DispatchError> {
        if batch.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        Ok(batch
            .iter()
            .map(|(&run_id, individual)| {
                debug!(generation = ctx.generation, run_id, "evaluating run");
                (run_id, evaluate_one(&self.optimizee, ctx, run_id, individual))
            })
            .collect())
    }
}

/// Evaluates runs concurrently on a rayon thread pool.
///
/// Evaluations share no mutable state and each gets its own derived seed,
/// so results match [`InlineDispatcher`] exactly.
#[cfg(feature = "parallel")]
pub struct ParallelDispatcher<O> {
    optimizee: O,
    pool: Option<rayon::ThreadPool>,
}

#[cfg(feature = "parallel")]
impl<O: Optimizee> ParallelDispatcher<O> {
    /// Uses rayon's global pool.
    pub fn new(optimizee: O) -> Self {
        Self {
            optimizee,
            pool: None,
        }
    }

    /// Uses a dedicated pool with `threads` workers.
    pub fn with_threads(optimizee: O, threads: usize) -> Result<Self, DispatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("blackopt-eval-{i}"))
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self {
            optimizee,
            pool: Some(pool),
        })
    }

    pub fn optimizee(&self) -> &O {
        &self.optimizee
    }
}

#[cfg(feature = "parallel")]
impl<O: Optimizee> Dispatcher for ParallelDispatcher<O> {
    fn dispatch(
        &mut self,
        ctx: &DispatchContext,
        batch: &Population,
    ) -> Result<DispatchResults, DispatchError> {
        use rayon::prelude::*;

        if batch.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }
        let optimizee = &self.optimizee;
        let runs: Vec<_> = batch.iter().collect();
        let evaluate = || -> DispatchResults {
            runs.par_iter()
                .map(|(&run_id, individual)| {
                    (run_id, evaluate_one(optimizee, ctx, run_id, individual))
                })
                .collect()
        };
        Ok(match &self.pool {
            Some(pool) => pool.install(evaluate),
            None => evaluate(),
        })
    }
}
