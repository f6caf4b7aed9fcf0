//! End-to-end optimization runs through the driver loop.

use u_blackopt::base::{BoxBounds, FitnessWeights, StopCriterion};
use u_blackopt::dispatch::{DispatchContext, Dispatcher, InlineDispatcher};
use u_blackopt::driver::{Experiment, LoopConfig, LoopResult};
use u_blackopt::es::EsConfig;
use u_blackopt::gd::{GdConfig, GdVariant};
use u_blackopt::optimizee::FunctionOptimizee;
use u_blackopt::optimizer::{Checkpoint, Optimizer, OptimizerConfig, StrategyConfig};
use u_blackopt::recorder::{generation_of_runs, Recorder, SUMMARY_GROUP};

fn sphere(dim: usize) -> FunctionOptimizee {
    let bounds = BoxBounds::uniform(dim, -5.0, 5.0).unwrap();
    FunctionOptimizee::new("sphere", bounds, |x, _| x.iter().map(|v| v * v).sum())
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn run(optimizee: &FunctionOptimizee, config: OptimizerConfig) -> (Optimizer, LoopResult) {
    let mut optimizer =
        Optimizer::for_optimizee(optimizee, FitnessWeights::minimize(), config).unwrap();
    let result = Experiment::in_memory(LoopConfig::default())
        .run(&mut optimizer, &mut InlineDispatcher::new(optimizee.clone()), None)
        .unwrap();
    (optimizer, result)
}

#[test]
fn test_es_minimizes_sphere() {
    let optimizee = sphere(2);
    let config = OptimizerConfig::new(StrategyConfig::Es(
        EsConfig::default()
            .with_learning_rate(1.0)
            .with_noise_std(0.5)
            .with_pop_size(20),
    ))
    .with_stop(StopCriterion::new(150))
    .with_seed(3);
    let (optimizer, result) = run(&optimizee, config);

    assert_eq!(result.generations_run, 150);
    assert_eq!(result.summary.total_runs, 3000);
    assert!(norm(optimizer.centroid()) < 1.0, "centroid {:?}", optimizer.centroid());
    let best = result.summary.best.unwrap();
    assert!(best.fitness > -0.05, "best fitness {}", best.fitness);
}

#[test]
fn test_gd_variants_minimize_sphere() {
    let variants = [
        (GdVariant::Classic, 60),
        (GdVariant::stochastic(), 200),
        (GdVariant::adam(), 200),
        (GdVariant::rms_prop(), 200),
    ];
    for (variant, generations) in variants {
        let optimizee = sphere(3);
        let config = OptimizerConfig::new(StrategyConfig::Gd(
            GdConfig::default()
                .with_learning_rate(0.1)
                .with_exploration_step_size(0.01)
                .with_n_random_steps(6)
                .with_variant(variant),
        ))
        .with_stop(StopCriterion::new(generations))
        .with_seed(17);
        let (optimizer, result) = run(&optimizee, config);

        assert_eq!(result.summary.total_runs, generations * 7);
        assert!(
            norm(optimizer.centroid()) < 0.5,
            "{} ended at {:?}",
            variant.name(),
            optimizer.centroid()
        );
        // GD evaluates its centroid every generation.
        assert!(optimizer
            .history()
            .iter()
            .all(|r| r.current_individual_fitness.is_some()));
    }
}

#[test]
fn test_threshold_stops_early() {
    let optimizee = sphere(2);
    let config = OptimizerConfig::new(StrategyConfig::Gd(
        GdConfig::default().with_learning_rate(0.2),
    ))
    .with_stop(StopCriterion::new(1000).with_stop_criterion(-1e-3))
    .with_seed(8);
    let (optimizer, result) = run(&optimizee, config);

    assert!(result.generations_run < 1000);
    assert!(result.summary.best.unwrap().fitness >= -1e-3);
    assert!(optimizer.is_stopped());
}

#[test]
fn test_identical_seeds_identical_trajectories() {
    let optimizee = sphere(4);
    let config = OptimizerConfig::new(StrategyConfig::Es(EsConfig::default().with_pop_size(10)))
        .with_stop(StopCriterion::new(25))
        .with_seed(123);

    let (a, ra) = run(&optimizee, config.clone());
    let (b, rb) = run(&optimizee, config);
    assert_eq!(a.history(), b.history());
    assert_eq!(ra.summary, rb.summary);
    assert_eq!(a.centroid(), b.centroid());
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_dispatch_same_trajectory() {
    use u_blackopt::dispatch::ParallelDispatcher;

    let optimizee = sphere(3);
    let config = OptimizerConfig::new(StrategyConfig::Gd(
        GdConfig::default().with_variant(GdVariant::adam()),
    ))
    .with_stop(StopCriterion::new(15))
    .with_seed(5);

    let (inline, _) = run(&optimizee, config.clone());
    let mut parallel =
        Optimizer::for_optimizee(&optimizee, FitnessWeights::minimize(), config).unwrap();
    let mut dispatcher = ParallelDispatcher::with_threads(optimizee.clone(), 3).unwrap();
    Experiment::in_memory(LoopConfig::default())
        .run(&mut parallel, &mut dispatcher, None)
        .unwrap();
    assert_eq!(inline.history(), parallel.history());
}

#[test]
fn test_resume_from_checkpoint_matches_uninterrupted() {
    let optimizee = sphere(3);
    let config = OptimizerConfig::new(StrategyConfig::Gd(
        GdConfig::default().with_variant(GdVariant::rms_prop()),
    ))
    .with_stop(StopCriterion::new(12))
    .with_seed(77);
    let (uninterrupted, full) = run(&optimizee, config.clone());

    // First half driven by hand, then checkpointed through a file.
    let mut first =
        Optimizer::for_optimizee(&optimizee, FitnessWeights::minimize(), config).unwrap();
    let mut dispatcher = InlineDispatcher::new(optimizee.clone());
    for _ in 0..5 {
        let ctx = DispatchContext::new(first.generation(), first.config().seed);
        let results = dispatcher.dispatch(&ctx, first.population()).unwrap();
        first.post_process(&results).unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoint.json");
    first.checkpoint().save(&path).unwrap();
    drop(first);

    let checkpoint = Checkpoint::load(&path).unwrap();
    assert_eq!(checkpoint.generation, 5);
    let mut resumed = Optimizer::resume(checkpoint, optimizee_bounding(&optimizee)).unwrap();
    let rest = Experiment::in_memory(LoopConfig::default())
        .run(&mut resumed, &mut dispatcher, None)
        .unwrap();

    assert_eq!(rest.generations_run, 7);
    assert_eq!(resumed.history(), uninterrupted.history());
    assert_eq!(rest.summary, full.summary);
}

fn optimizee_bounding(
    optimizee: &FunctionOptimizee,
) -> Option<std::sync::Arc<dyn u_blackopt::base::Bounding>> {
    use u_blackopt::optimizee::Optimizee;
    optimizee.bounding()
}

#[test]
fn test_trajectory_store_contents() {
    let optimizee = sphere(2);
    let config = OptimizerConfig::new(StrategyConfig::Es(EsConfig::default().with_pop_size(4)))
        .with_stop(StopCriterion::new(3))
        .with_seed(1);
    let mut optimizer =
        Optimizer::for_optimizee(&optimizee, FitnessWeights::minimize(), config).unwrap();
    let mut recorder = Recorder::for_run(&optimizee, &optimizer);
    let mut experiment = Experiment::in_memory(LoopConfig::default());
    experiment
        .run(
            &mut optimizer,
            &mut InlineDispatcher::new(optimizee.clone()),
            Some(&mut recorder),
        )
        .unwrap();
    let store = experiment.into_store();

    // Run-ids are global and contiguous across generations.
    let ids: Vec<usize> = store.runs().keys().copied().collect();
    assert_eq!(ids, (0..12).collect::<Vec<_>>());
    let pop_sizes: Vec<usize> = store.generations().iter().map(|g| g.pop_size).collect();
    let expected = generation_of_runs(&pop_sizes);
    for (run_id, record) in store.runs() {
        assert_eq!(record.generation, expected[*run_id]);
    }
    assert_eq!(store.params(SUMMARY_GROUP).unwrap()["total_runs"], 12);
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "strategy": {
            "kind": "gd",
            "learning_rate": 0.1,
            "n_random_steps": 4,
            "variant": {"kind": "adam", "first_order_decay": 0.9, "second_order_decay": 0.99}
        },
        "stop": {"n_iteration": 5},
        "seed": 42,
        "failure_policy": {"kind": "value", "value": -1000.0}
    }"#;
    let config = OptimizerConfig::from_json_str(json).unwrap();
    assert_eq!(config.strategy.pop_size(), 5);

    let (_, result) = run(&sphere(2), config);
    assert_eq!(result.generations_run, 5);
    assert_eq!(result.summary.optimizer, "GradientDescentOptimizer");
}
