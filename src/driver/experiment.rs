//! The driving loop.

use super::config::{LoopConfig, TimeoutPolicy};
use super::types::LoopResult;
use crate::base::{FitnessOutcome, Population, RunId};
use crate::dispatch::{DispatchContext, DispatchError, DispatchResults, Dispatcher};
use crate::error::{OptimError, Result};
use crate::optimizer::Optimizer;
use crate::recorder::{InMemoryTrajectory, Recorder, TrajectoryStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the trajectory store and drives an [`Optimizer`] through a
/// [`Dispatcher`] until it stops.
///
/// Per generation: dispatch, re-dispatch what went missing or failed,
/// penalize or abort on what is still missing, record every run, hand the
/// results to the optimizer, record the generation, checkpoint.
///
/// # Usage
///
/// ```ignore
/// let mut optimizer = Optimizer::for_optimizee(&sphere, FitnessWeights::minimize(), config)?;
/// let mut recorder = Recorder::for_run(&sphere, &optimizer);
/// let mut experiment = Experiment::in_memory(LoopConfig::default());
/// let result = experiment.run(&mut optimizer, &mut InlineDispatcher::new(sphere), Some(&mut recorder))?;
/// ```
#[derive(Debug)]
pub struct Experiment<S = InMemoryTrajectory> {
    config: LoopConfig,
    store: S,
}

impl Experiment<InMemoryTrajectory> {
    pub fn in_memory(config: LoopConfig) -> Self {
        Self::new(config, InMemoryTrajectory::new())
    }
}

impl<S: TrajectoryStore> Experiment<S> {
    pub fn new(config: LoopConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Runs until the optimizer stops.
    pub fn run<D: Dispatcher>(
        &mut self,
        optimizer: &mut Optimizer,
        dispatcher: &mut D,
        recorder: Option<&mut Recorder>,
    ) -> Result<LoopResult> {
        self.run_with_cancel(optimizer, dispatcher, recorder, None)
    }

    /// Runs with an optional cancellation token.
    ///
    /// The flag is checked between generations. A cancelled loop ends the
    /// optimizer and returns the best result found so far.
    pub fn run_with_cancel<D: Dispatcher>(
        &mut self,
        optimizer: &mut Optimizer,
        dispatcher: &mut D,
        mut recorder: Option<&mut Recorder>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<LoopResult> {
        if let Some(rec) = recorder.as_deref_mut() {
            rec.start(&mut self.store);
        }

        let mut population = optimizer.population().clone();
        let mut generations_run = 0usize;
        let mut redispatched_runs = 0usize;
        let mut timed_out_runs = 0usize;
        let mut cancelled = false;

        while !population.is_empty() {
            if let Some(ref flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    info!(generation = optimizer.generation(), "optimization cancelled");
                    cancelled = true;
                    break;
                }
            }

            let ctx = DispatchContext::new(optimizer.generation(), optimizer.config().seed);
            let round = self.dispatch_generation(dispatcher, &ctx, &population)?;
            redispatched_runs += round.redispatched;
            timed_out_runs += round.timed_out;

            for (&run_id, individual) in &population {
                let outcome = round.results.get(&run_id).cloned().unwrap_or_else(|| {
                    FitnessOutcome::Failed("no result".into())
                });
                if let Err(e) = self.store.store_run(ctx.generation, run_id, individual, &outcome) {
                    warn!(run_id, error = %e, "failed to record run");
                }
            }

            population = optimizer.post_process(&round.results)?;
            generations_run += 1;

            if let Some(record) = optimizer.history().last() {
                if let Err(e) = self.store.store_generation(record) {
                    warn!(generation = record.generation, error = %e, "failed to record generation");
                }
            }
            if let Some(path) = &self.config.checkpoint_path {
                optimizer.checkpoint().save(path)?;
                debug!(path = %path.display(), "checkpoint written");
            }
        }

        let summary = optimizer.end().clone();
        if let Some(rec) = recorder {
            rec.end(&mut self.store, &summary);
        }

        Ok(LoopResult {
            summary,
            generations_run,
            redispatched_runs,
            timed_out_runs,
            cancelled,
        })
    }

    /// Dispatches one generation, re-dispatching per the retry policy.
    fn dispatch_generation<D: Dispatcher>(
        &self,
        dispatcher: &mut D,
        ctx: &DispatchContext,
        population: &Population,
    ) -> Result<Round> {
        let retry = self.config.retry;
        let mut results = DispatchResults::new();
        let mut outstanding = population.clone();
        let mut redispatched = 0usize;
        let mut attempt = 0usize;

        loop {
            let reported = match dispatcher.dispatch(ctx, &outstanding) {
                Ok(reported) => reported,
                Err(DispatchError::Timeout { completed, missing }) => {
                    warn!(
                        generation = ctx.generation,
                        attempt,
                        missing = missing.len(),
                        "dispatch timed out"
                    );
                    completed
                }
                Err(e) => return Err(OptimError::Transport(e.to_string())),
            };
            for (run_id, outcome) in reported {
                if outstanding.contains_key(&run_id) {
                    results.insert(run_id, outcome);
                } else {
                    warn!(run_id, generation = ctx.generation, "ignoring result for run not in this dispatch");
                }
            }

            let missing: Vec<RunId> = outstanding
                .keys()
                .filter(|id| !results.contains_key(*id))
                .copied()
                .collect();
            let failed: Vec<RunId> = if retry.retry_failed {
                outstanding
                    .keys()
                    .filter(|id| results.get(*id).is_some_and(FitnessOutcome::is_failed))
                    .copied()
                    .collect()
            } else {
                Vec::new()
            };

            if missing.is_empty() && failed.is_empty() {
                break;
            }
            if attempt >= retry.max_redispatch {
                if !missing.is_empty() {
                    if let Err(e) = dispatcher.abandon(ctx, &missing) {
                        warn!(generation = ctx.generation, error = %e, "failed to clean up abandoned runs");
                    }
                    match self.config.on_timeout {
                        TimeoutPolicy::Abort => {
                            return Err(OptimError::DispatchTimeout {
                                generation: ctx.generation,
                                missing,
                            });
                        }
                        TimeoutPolicy::Penalize => {
                            warn!(
                                generation = ctx.generation,
                                missing = missing.len(),
                                "penalizing runs that never reported"
                            );
                            for &run_id in &missing {
                                results.insert(run_id, FitnessOutcome::Failed("timed out".into()));
                            }
                            return Ok(Round {
                                results,
                                redispatched,
                                timed_out: missing.len(),
                            });
                        }
                    }
                }
                break;
            }

            attempt += 1;
            outstanding.retain(|id, _| missing.contains(id) || failed.contains(id));
            redispatched += outstanding.len();
            info!(
                generation = ctx.generation,
                attempt,
                missing = missing.len(),
                failed = failed.len(),
                "re-dispatching runs"
            );
        }

        Ok(Round {
            results,
            redispatched,
            timed_out: 0,
        })
    }
}

struct Round {
    results: DispatchResults,
    redispatched: usize,
    timed_out: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{BoxBounds, FitnessWeights, StopCriterion};
    use crate::dispatch::InlineDispatcher;
    use crate::driver::RetryPolicy;
    use crate::es::EsConfig;
    use crate::optimizee::FunctionOptimizee;
    use crate::optimizer::{OptimizerConfig, StrategyConfig};
    use crate::recorder::{OPTIMIZER_GROUP, SUMMARY_GROUP};
    use std::collections::BTreeMap;

    fn sphere() -> FunctionOptimizee {
        let bounds = BoxBounds::uniform(2, -5.0, 5.0).unwrap();
        FunctionOptimizee::new("sphere", bounds, |x, _| x.iter().map(|v| v * v).sum())
    }

    fn es_config(pop: usize, generations: usize) -> OptimizerConfig {
        OptimizerConfig::new(StrategyConfig::Es(EsConfig::default().with_pop_size(pop)))
            .with_stop(StopCriterion::new(generations))
            .with_seed(11)
    }

    /// Wraps an inline dispatcher and drops or fails runs by their index
    /// within a generation of four.
    struct Flaky {
        inner: InlineDispatcher<FunctionOptimizee>,
        drop_first: Vec<usize>,
        fail_first: Vec<usize>,
        calls: BTreeMap<RunId, usize>,
        drop_always: bool,
        abandoned: Vec<RunId>,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl Flaky {
        fn new(drop_first: Vec<usize>, fail_first: Vec<usize>) -> Self {
            Self {
                inner: InlineDispatcher::new(sphere()),
                drop_first,
                fail_first,
                calls: BTreeMap::new(),
                drop_always: false,
                abandoned: Vec::new(),
                cancel_after: None,
            }
        }
    }

    impl Dispatcher for Flaky {
        fn dispatch(
            &mut self,
            ctx: &DispatchContext,
            batch: &Population,
        ) -> std::result::Result<DispatchResults, DispatchError> {
            if let Some((generation, flag)) = &self.cancel_after {
                if ctx.generation == *generation {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            let mut completed = self.inner.dispatch(ctx, batch)?;
            let mut missing = Vec::new();
            for &run_id in batch.keys() {
                let n = self.calls.entry(run_id).or_insert(0);
                *n += 1;
                let index = run_id % 4;
                let first = *n == 1;
                if self.drop_first.contains(&index) && (first || self.drop_always) {
                    completed.remove(&run_id);
                    missing.push(run_id);
                } else if self.fail_first.contains(&index) && first {
                    completed.insert(run_id, FitnessOutcome::Failed("crashed".into()));
                }
            }
            if missing.is_empty() {
                Ok(completed)
            } else {
                Err(DispatchError::Timeout { completed, missing })
            }
        }

        fn abandon(
            &mut self,
            _: &DispatchContext,
            run_ids: &[RunId],
        ) -> std::result::Result<(), DispatchError> {
            self.abandoned.extend_from_slice(run_ids);
            Ok(())
        }
    }

    #[test]
    fn test_runs_to_completion_and_records() {
        let sphere = sphere();
        let mut optimizer =
            Optimizer::for_optimizee(&sphere, FitnessWeights::minimize(), es_config(6, 4)).unwrap();
        let mut recorder = Recorder::for_run(&sphere, &optimizer);
        let mut experiment = Experiment::in_memory(LoopConfig::default());
        let result = experiment
            .run(&mut optimizer, &mut InlineDispatcher::new(sphere), Some(&mut recorder))
            .unwrap();

        assert_eq!(result.generations_run, 4);
        assert_eq!(result.summary.total_runs, 24);
        assert!(!result.cancelled);
        let store = experiment.store();
        assert_eq!(store.runs().len(), 24);
        assert_eq!(store.generations().len(), 4);
        assert!(store.params(OPTIMIZER_GROUP).is_some());
        assert_eq!(store.params(SUMMARY_GROUP).unwrap()["generations"], 4);
    }

    #[test]
    fn test_missing_runs_redispatched_once() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 1)).unwrap();
        let mut dispatcher = Flaky::new(vec![1], vec![]);
        let mut experiment = Experiment::in_memory(LoopConfig::default());
        let result = experiment.run(&mut optimizer, &mut dispatcher, None).unwrap();

        assert_eq!(result.redispatched_runs, 1);
        assert_eq!(result.timed_out_runs, 0);
        assert_eq!(result.summary.failed_runs, 0);
    }

    #[test]
    fn test_failed_runs_retried() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 1)).unwrap();
        let mut dispatcher = Flaky::new(vec![], vec![0, 2]);
        let mut experiment = Experiment::in_memory(LoopConfig::default());
        let result = experiment.run(&mut optimizer, &mut dispatcher, None).unwrap();
        assert_eq!(result.redispatched_runs, 2);
        assert_eq!(result.summary.failed_runs, 0);
    }

    #[test]
    fn test_failed_runs_kept_without_retry() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 1)).unwrap();
        let mut dispatcher = Flaky::new(vec![], vec![0]);
        let config = LoopConfig::default().with_retry(RetryPolicy::none());
        let result = Experiment::in_memory(config)
            .run(&mut optimizer, &mut dispatcher, None)
            .unwrap();
        assert_eq!(result.redispatched_runs, 0);
        assert_eq!(result.summary.failed_runs, 1);
    }

    #[test]
    fn test_persistent_timeout_penalized() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 2)).unwrap();
        let mut dispatcher = Flaky::new(vec![3], vec![]);
        dispatcher.drop_always = true;
        let mut experiment = Experiment::in_memory(LoopConfig::default());
        let result = experiment.run(&mut optimizer, &mut dispatcher, None).unwrap();

        assert_eq!(result.timed_out_runs, 2);
        assert_eq!(result.summary.failed_runs, 2);
        let record = experiment.store().run(3).unwrap();
        assert!(record.outcome.is_failed());
        assert_eq!(dispatcher.abandoned, vec![3, 7]);
    }

    #[test]
    fn test_persistent_timeout_aborts() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 2)).unwrap();
        let mut dispatcher = Flaky::new(vec![3], vec![]);
        dispatcher.drop_always = true;
        let config = LoopConfig::default().with_timeout_policy(TimeoutPolicy::Abort);
        let err = Experiment::in_memory(config)
            .run(&mut optimizer, &mut dispatcher, None)
            .unwrap_err();
        assert!(matches!(
            err,
            OptimError::DispatchTimeout { generation: 0, ref missing } if missing == &vec![3]
        ));
        assert_eq!(dispatcher.abandoned, vec![3]);
    }

    #[test]
    fn test_recovered_runs_not_abandoned() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 2)).unwrap();
        let mut dispatcher = Flaky::new(vec![1], vec![]);
        Experiment::in_memory(LoopConfig::default())
            .run(&mut optimizer, &mut dispatcher, None)
            .unwrap();
        assert!(dispatcher.abandoned.is_empty());
    }

    #[test]
    fn test_cancel_between_generations() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 50)).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut dispatcher = Flaky::new(vec![], vec![]);
        dispatcher.cancel_after = Some((2, Arc::clone(&cancel)));
        let mut experiment = Experiment::in_memory(LoopConfig::default());
        let result = experiment
            .run_with_cancel(&mut optimizer, &mut dispatcher, None, Some(cancel))
            .unwrap();

        // The generation in flight when the flag was raised still completes.
        assert!(result.cancelled);
        assert_eq!(result.generations_run, 3);
        assert_eq!(result.summary.generations, 3);
        assert_eq!(experiment.store().generations().len(), 3);
        assert!(optimizer.is_stopped());
    }

    #[test]
    fn test_cancel_before_first_generation() {
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 50)).unwrap();
        let cancel = Arc::new(AtomicBool::new(true));
        let result = Experiment::in_memory(LoopConfig::default())
            .run_with_cancel(&mut optimizer, &mut InlineDispatcher::new(sphere()), None, Some(cancel))
            .unwrap();
        assert!(result.cancelled);
        assert_eq!(result.generations_run, 0);
        assert!(optimizer.is_stopped());
    }

    #[test]
    fn test_checkpoint_written_each_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimizer.json");
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 3)).unwrap();
        let config = LoopConfig::default().with_checkpoint_path(&path);
        Experiment::in_memory(config)
            .run(&mut optimizer, &mut InlineDispatcher::new(sphere()), None)
            .unwrap();
        let checkpoint = crate::optimizer::Checkpoint::load(&path).unwrap();
        assert_eq!(checkpoint.generation, 3);
        assert_eq!(checkpoint.pop_sizes(), vec![4, 4, 4]);
    }

    #[test]
    fn test_transport_failure_is_fatal() {
        struct Down;
        impl Dispatcher for Down {
            fn dispatch(
                &mut self,
                _: &DispatchContext,
                _: &Population,
            ) -> std::result::Result<DispatchResults, DispatchError> {
                Err(DispatchError::Transport("scheduler offline".into()))
            }
        }
        let mut optimizer =
            Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), es_config(4, 2)).unwrap();
        let err = Experiment::in_memory(LoopConfig::default())
            .run(&mut optimizer, &mut Down, None)
            .unwrap_err();
        assert!(matches!(err, OptimError::Transport(msg) if msg.contains("offline")));
    }
}
