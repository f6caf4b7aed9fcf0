//! The filesystem transport driven end to end, including runs that never
//! report.

use std::time::Duration;
use u_blackopt::base::{BoxBounds, FitnessWeights, RunId, StopCriterion};
use u_blackopt::dispatch::{FileDispatcher, FileLayout, FileWorker, PollPolicy};
use u_blackopt::driver::{Experiment, LoopConfig, TimeoutPolicy};
use u_blackopt::error::OptimError;
use u_blackopt::es::EsConfig;
use u_blackopt::optimizee::FunctionOptimizee;
use u_blackopt::optimizer::{Optimizer, OptimizerConfig, StrategyConfig};

const POP: usize = 20;

fn sphere() -> FunctionOptimizee {
    let bounds = BoxBounds::uniform(3, -5.0, 5.0).unwrap();
    FunctionOptimizee::new("sphere", bounds, |x, _| x.iter().map(|v| v * v).sum())
}

fn optimizer(generations: usize) -> Optimizer {
    let config = OptimizerConfig::new(StrategyConfig::Es(EsConfig::default().with_pop_size(POP)))
        .with_stop(StopCriterion::new(generations))
        .with_seed(2024);
    Optimizer::for_optimizee(&sphere(), FitnessWeights::minimize(), config).unwrap()
}

/// A launcher that evaluates every run except the given positions within
/// a generation.
fn lossy_launcher(
    worker: FileWorker<FunctionOptimizee>,
    silent: &'static [usize],
) -> impl FnMut(&FileLayout, usize, &[RunId]) -> Result<(), String> {
    move |_: &FileLayout, generation: usize, run_ids: &[RunId]| -> Result<(), String> {
        for &run_id in run_ids.iter().filter(|&&id| !silent.contains(&(id % POP))) {
            worker.serve(generation, run_id).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

fn fast_poll() -> PollPolicy {
    PollPolicy::bounded(Duration::from_millis(25), Duration::from_millis(2))
}

#[test]
fn test_silent_runs_penalized_after_one_retry() {
    let dir = tempfile::tempdir().unwrap();
    let worker = FileWorker::new(dir.path(), sphere());
    let mut dispatcher =
        FileDispatcher::with_launcher(dir.path(), fast_poll(), lossy_launcher(worker, &[3, 8, 15]));
    let mut optimizer = optimizer(2);
    let mut experiment = Experiment::in_memory(LoopConfig::default());
    let result = experiment.run(&mut optimizer, &mut dispatcher, None).unwrap();

    // Three silent runs per generation, each re-dispatched once.
    assert_eq!(result.generations_run, 2);
    assert_eq!(result.redispatched_runs, 6);
    assert_eq!(result.timed_out_runs, 6);
    assert_eq!(result.summary.failed_runs, 6);
    for record in optimizer.history() {
        assert_eq!(record.failed_runs, 3);
    }

    let store = experiment.store();
    assert!(store.run(3).unwrap().outcome.is_failed());
    assert!(store.run(23).unwrap().outcome.is_failed());
    assert!(!store.run(4).unwrap().outcome.is_failed());

    // A penalized run never becomes best-so-far.
    let best = result.summary.best.unwrap();
    let silent_ids = [3, 8, 15, 23, 28, 35];
    assert!(silent_ids
        .iter()
        .all(|id| store.run(*id).unwrap().individual != best.individual));

    // Given-up runs leave nothing behind for a worker to pick up.
    for sub in ["inputs", "results", "ready"] {
        let left: Vec<_> = std::fs::read_dir(dir.path().join(sub)).unwrap().collect();
        assert!(left.is_empty(), "{sub} still holds {left:?}");
    }
}

#[test]
fn test_silent_runs_abort_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let worker = FileWorker::new(dir.path(), sphere());
    let mut dispatcher =
        FileDispatcher::with_launcher(dir.path(), fast_poll(), lossy_launcher(worker, &[7]));
    let config = LoopConfig::default().with_timeout_policy(TimeoutPolicy::Abort);
    let err = Experiment::in_memory(config)
        .run(&mut optimizer(3), &mut dispatcher, None)
        .unwrap_err();

    match err {
        OptimError::DispatchTimeout { generation, missing } => {
            assert_eq!(generation, 0);
            assert_eq!(missing, vec![7]);
        }
        other => panic!("expected dispatch timeout, got {other}"),
    }
}

#[test]
fn test_file_transport_matches_inline() {
    use u_blackopt::dispatch::InlineDispatcher;

    let dir = tempfile::tempdir().unwrap();
    let worker = FileWorker::new(dir.path(), sphere());
    let mut file = FileDispatcher::with_launcher(dir.path(), fast_poll(), lossy_launcher(worker, &[]));
    let mut via_files = optimizer(4);
    Experiment::in_memory(LoopConfig::default())
        .run(&mut via_files, &mut file, None)
        .unwrap();

    let mut inline = optimizer(4);
    Experiment::in_memory(LoopConfig::default())
        .run(&mut inline, &mut InlineDispatcher::new(sphere()), None)
        .unwrap();

    assert_eq!(via_files.history(), inline.history());
}
