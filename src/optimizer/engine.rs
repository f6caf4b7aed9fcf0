//! The optimizer state machine.

use super::checkpoint::Checkpoint;
use super::config::{OptimizerConfig, WorstFitness};
use super::strategy::Strategy;
use super::types::{BestSoFar, GenerationRecord, OptimizerSummary, Phase};
use crate::base::{
    create_rng, derive_seed, Bounding, FitnessOutcome, FitnessWeights, Individual, OptimRng,
    Population, RunId, StopReason,
};
use crate::error::{OptimError, Result};
use crate::optimizee::Optimizee;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stateful optimizer: owns the strategy, the RNG, and the history.
///
/// The optimizer is driven one generation at a time:
///
/// 1. [`population`](Self::population) is the generation out for evaluation.
/// 2. [`post_process`](Self::post_process) consumes its results and returns
///    the next generation, or an empty map once `STOPPED`.
/// 3. [`end`](Self::end) finalizes the summary (idempotent).
///
/// # Usage
///
/// ```ignore
/// let mut optimizer = Optimizer::for_optimizee(&optimizee, FitnessWeights::minimize(), config)?;
/// let mut population = optimizer.population().clone();
/// while !population.is_empty() {
///     let results = dispatcher.dispatch(&ctx, &population)?;
///     population = optimizer.post_process(&results)?;
/// }
/// let summary = optimizer.end();
/// ```
pub struct Optimizer {
    config: OptimizerConfig,
    weights: FitnessWeights,
    bounding: Option<Arc<dyn Bounding>>,
    strategy: Strategy,
    rng: OptimRng,
    phase: Phase,
    generation: usize,
    next_run_id: RunId,
    pending: Population,
    best: Option<BestSoFar>,
    history: Vec<GenerationRecord>,
    failed_runs: usize,
    stop_reason: Option<StopReason>,
    summary: Option<OptimizerSummary>,
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("strategy", &self.strategy.name())
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("pending", &self.pending.len())
            .field("best", &self.best.as_ref().map(|b| b.fitness))
            .finish_non_exhaustive()
    }
}

impl Optimizer {
    /// Creates an optimizer and samples its first generation.
    ///
    /// `create_individual` is called once, with an RNG stream derived from
    /// the configured seed but separate from the optimizer's own RNG.
    pub fn new<F>(
        create_individual: F,
        fitness_weights: FitnessWeights,
        config: OptimizerConfig,
        bounding: Option<Arc<dyn Bounding>>,
    ) -> Result<Self>
    where
        F: FnOnce(&mut OptimRng) -> Individual,
    {
        config.validate()?;

        let mut init_rng = create_rng(derive_seed(config.seed, 0, RunId::MAX));
        let start = create_individual(&mut init_rng);
        if start.dim() == 0 {
            return Err(OptimError::Configuration(
                "create_individual returned an empty individual".into(),
            ));
        }
        let start = bound_with(bounding.as_deref(), start)?;

        let mut optimizer = Self {
            strategy: Strategy::new(&config.strategy, start.into_vec()),
            rng: create_rng(config.seed),
            weights: fitness_weights,
            bounding,
            phase: Phase::Initialized,
            generation: 0,
            next_run_id: 0,
            pending: Population::new(),
            best: None,
            history: Vec::new(),
            failed_runs: 0,
            stop_reason: None,
            summary: None,
            config,
        };
        optimizer.propose()?;

        info!(
            optimizer = optimizer.strategy.name(),
            pop_size = optimizer.pending.len(),
            seed = optimizer.config.seed,
            "optimizer initialized"
        );
        Ok(optimizer)
    }

    /// Builds an optimizer from an [`Optimizee`]'s sampler and bounding
    /// function.
    pub fn for_optimizee<O: Optimizee>(
        optimizee: &O,
        fitness_weights: FitnessWeights,
        config: OptimizerConfig,
    ) -> Result<Self> {
        Self::new(
            |rng| optimizee.create_individual(rng),
            fitness_weights,
            config,
            optimizee.bounding(),
        )
    }

    /// Restores an optimizer from a checkpoint.
    ///
    /// The bounding function is not serializable and must be supplied again.
    pub fn resume(checkpoint: Checkpoint, bounding: Option<Arc<dyn Bounding>>) -> Result<Self> {
        checkpoint.config.validate()?;
        info!(
            generation = checkpoint.generation,
            phase = ?checkpoint.phase,
            "optimizer resumed from checkpoint"
        );
        Ok(Self {
            config: checkpoint.config,
            weights: checkpoint.weights,
            bounding,
            strategy: checkpoint.strategy,
            rng: checkpoint.rng,
            phase: checkpoint.phase,
            generation: checkpoint.generation,
            next_run_id: checkpoint.next_run_id,
            pending: checkpoint.pending,
            best: checkpoint.best,
            history: checkpoint.history,
            failed_runs: checkpoint.failed_runs,
            stop_reason: checkpoint.stop_reason,
            summary: checkpoint.summary,
        })
    }

    /// Captures everything needed to continue bit-identically.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            config: self.config.clone(),
            weights: self.weights.clone(),
            strategy: self.strategy.clone(),
            rng: self.rng.clone(),
            phase: self.phase,
            generation: self.generation,
            next_run_id: self.next_run_id,
            pending: self.pending.clone(),
            best: self.best.clone(),
            history: self.history.clone(),
            failed_runs: self.failed_runs,
            stop_reason: self.stop_reason,
            summary: self.summary.clone(),
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn fitness_weights(&self) -> &FitnessWeights {
        &self.weights
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    /// Number of generations processed so far; also the number of the
    /// generation currently out for evaluation.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// The generation awaiting results. Empty once stopped.
    pub fn population(&self) -> &Population {
        &self.pending
    }

    pub fn centroid(&self) -> &[f64] {
        self.strategy.centroid()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn best(&self) -> Option<&BestSoFar> {
        self.best.as_ref()
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Flat hyperparameter snapshot for the recorder.
    pub fn get_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("optimizer".into(), Value::from(self.strategy.name()));

        let strategy = serde_json::to_value(&self.config.strategy).unwrap_or_else(|e| {
            warn!(error = %e, "strategy config not serializable, params incomplete");
            Value::Null
        });
        if let Value::Object(fields) = strategy {
            for (key, value) in fields {
                match value {
                    Value::Object(nested) => {
                        for (inner, v) in nested {
                            let name = if inner == "kind" { key.clone() } else { inner };
                            params.insert(name, v);
                        }
                    }
                    other => {
                        let name = if key == "kind" { "strategy".to_string() } else { key };
                        params.insert(name, other);
                    }
                }
            }
        }

        params.insert("n_iteration".into(), Value::from(self.config.stop.n_iteration));
        params.insert(
            "stop_criterion".into(),
            serde_json::to_value(self.config.stop)
                .map_err(|e| warn!(error = %e, "stop criterion not serializable"))
                .ok()
                .and_then(|v| v.get("stop_criterion").cloned())
                .unwrap_or(Value::Null),
        );
        params.insert("seed".into(), Value::from(self.config.seed));
        params.insert("pop_size".into(), Value::from(self.strategy.pop_size()));
        params.insert(
            "fitness_weights".into(),
            Value::from(self.weights.as_slice().to_vec()),
        );
        params
    }

    /// Consumes the results of the pending generation and returns the next
    /// one.
    ///
    /// Results are matched strictly by run-id; arrival order is irrelevant.
    /// Failed or missing runs never become best-so-far and never outweigh a
    /// successful run in the update: ES ranks them last (or scores them at
    /// the configured worst fitness when unshaped), GD leaves them out of
    /// the gradient fit and skips the step when the centroid run failed.
    /// Results for unknown run-ids are ignored.
    ///
    /// Returns an empty population once the stopping criterion fires, and
    /// for every call after that.
    pub fn post_process(&mut self, results: &BTreeMap<RunId, FitnessOutcome>) -> Result<Population> {
        if self.phase == Phase::Stopped {
            debug!(discarded = results.len(), "optimizer stopped, discarding results");
            return Ok(Population::new());
        }
        self.phase = Phase::Running;

        for run_id in results.keys().filter(|id| !self.pending.contains_key(*id)) {
            warn!(run_id, generation = self.generation, "ignoring result for unknown run");
        }

        // Weighted fitness in run order; `None` marks a failed run.
        let mut weighted: Vec<Option<f64>> = Vec::with_capacity(self.pending.len());
        for run_id in self.pending.keys() {
            let value = match results.get(run_id) {
                Some(FitnessOutcome::Evaluated(raw)) => {
                    let w = self.weights.apply(raw)?;
                    if w.is_finite() {
                        Some(w)
                    } else {
                        warn!(run_id, generation = self.generation, "non-finite fitness");
                        None
                    }
                }
                Some(FitnessOutcome::Failed(reason)) => {
                    warn!(run_id, generation = self.generation, %reason, "evaluation failed");
                    None
                }
                None => {
                    warn!(run_id, generation = self.generation, "no result for run");
                    None
                }
            };
            weighted.push(value);
        }

        let successes: Vec<f64> = weighted.iter().flatten().copied().collect();
        if successes.is_empty() {
            return Err(OptimError::AllRunsFailed {
                generation: self.generation,
            });
        }
        let failed = weighted.len() - successes.len();
        let worst = match self.config.failure_policy {
            WorstFitness::GenerationMinimum => {
                successes.iter().copied().fold(f64::INFINITY, f64::min)
            }
            WorstFitness::Value { value } => value,
        };

        for ((_, individual), w) in self.pending.iter().zip(&weighted) {
            if let Some(w) = *w {
                if self.best.as_ref().map_or(true, |b| w > b.fitness) {
                    self.best = Some(BestSoFar {
                        individual: individual.clone(),
                        fitness: w,
                        generation: self.generation,
                    });
                }
            }
        }

        let record = GenerationRecord {
            generation: self.generation,
            pop_size: self.pending.len(),
            first_run_id: self.pending.keys().next().copied().unwrap_or(self.next_run_id),
            best_fitness_in_run: successes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            average_fitness_in_run: successes.iter().sum::<f64>() / successes.len() as f64,
            current_individual_fitness: self.strategy.centroid_fitness(&weighted),
            failed_runs: failed,
            learning_rate: self.strategy.learning_rate(),
            exploration: self.strategy.exploration(),
        };

        let individuals: Vec<&Individual> = self.pending.values().collect();
        self.strategy.update(&individuals, &weighted, worst, &mut self.rng)?;
        let centroid = bound_with(
            self.bounding.as_deref(),
            Individual::new(self.strategy.centroid().to_vec()),
        )?;
        self.strategy.set_centroid(centroid.into_vec());

        info!(
            generation = record.generation,
            pop_size = record.pop_size,
            best = record.best_fitness_in_run,
            average = record.average_fitness_in_run,
            failed = record.failed_runs,
            "generation processed"
        );
        self.history.push(record);
        self.failed_runs += failed;
        self.generation += 1;

        let best_fitness = self.best.as_ref().map_or(f64::NEG_INFINITY, |b| b.fitness);
        if let Some(reason) = self.config.stop.should_stop(self.generation, best_fitness) {
            self.stop(reason);
            return Ok(Population::new());
        }

        self.propose()?;
        Ok(self.pending.clone())
    }

    /// Finalizes summary statistics. Idempotent; stops a running optimizer.
    pub fn end(&mut self) -> &OptimizerSummary {
        if self.phase != Phase::Stopped {
            self.stop(StopReason::Ended);
        }
        let Self {
            summary,
            strategy,
            generation,
            history,
            failed_runs,
            best,
            stop_reason,
            ..
        } = self;
        summary.get_or_insert_with(|| {
            let summary = OptimizerSummary {
                optimizer: strategy.name().to_string(),
                generations: *generation,
                total_runs: history.iter().map(|r| r.pop_size).sum(),
                failed_runs: *failed_runs,
                best: best.clone(),
                final_centroid: strategy.centroid().to_vec(),
                stop_reason: *stop_reason,
            };
            info!(
                generations = summary.generations,
                total_runs = summary.total_runs,
                failed_runs = summary.failed_runs,
                best = ?summary.best.as_ref().map(|b| b.fitness),
                "optimizer finished"
            );
            summary
        })
    }

    fn stop(&mut self, reason: StopReason) {
        info!(generation = self.generation, ?reason, "optimizer stopped");
        self.phase = Phase::Stopped;
        self.stop_reason = Some(reason);
        self.pending.clear();
    }

    /// Samples, bounds, and numbers the next generation.
    fn propose(&mut self) -> Result<()> {
        let proposals = self.strategy.propose(&mut self.rng);
        let mut pending = Population::new();
        for individual in proposals {
            let bounded = bound_with(self.bounding.as_deref(), individual)?;
            pending.insert(self.next_run_id, bounded);
            self.next_run_id += 1;
        }
        self.pending = pending;
        Ok(())
    }
}

fn bound_with(bounding: Option<&dyn Bounding>, individual: Individual) -> Result<Individual> {
    let Some(bounding) = bounding else {
        return Ok(individual);
    };
    let bounded = bounding
        .bound(&individual)
        .map_err(|e| OptimError::Configuration(format!("bounding function failed: {e}")))?;
    if bounded.dim() != individual.dim() {
        return Err(OptimError::Configuration(format!(
            "bounding function changed dimension from {} to {}",
            individual.dim(),
            bounded.dim()
        )));
    }
    Ok(bounded)
}
