//! The closed set of strategies behind one update capability.

use super::config::StrategyConfig;
use crate::base::Individual;
use crate::error::Result;
use crate::es::EsStrategy;
use crate::gd::GdStrategy;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Strategy state, selected at construction from a [`StrategyConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    Es(EsStrategy),
    Gd(GdStrategy),
}

impl Strategy {
    pub fn new(config: &StrategyConfig, centroid: Vec<f64>) -> Self {
        match config {
            StrategyConfig::Es(c) => Strategy::Es(EsStrategy::new(c.clone(), centroid)),
            StrategyConfig::Gd(c) => Strategy::Gd(GdStrategy::new(c.clone(), centroid)),
        }
    }

    /// Name forwarded to the recorder.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Es(_) => "EvolutionStrategiesOptimizer",
            Strategy::Gd(_) => "GradientDescentOptimizer",
        }
    }

    pub fn pop_size(&self) -> usize {
        match self {
            Strategy::Es(es) => es.config().pop_size,
            Strategy::Gd(gd) => gd.config().pop_size(),
        }
    }

    pub fn centroid(&self) -> &[f64] {
        match self {
            Strategy::Es(es) => es.centroid(),
            Strategy::Gd(gd) => gd.centroid(),
        }
    }

    pub(crate) fn set_centroid(&mut self, centroid: Vec<f64>) {
        match self {
            Strategy::Es(es) => es.set_centroid(centroid),
            Strategy::Gd(gd) => gd.set_centroid(centroid),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Strategy::Es(es) => es.config().learning_rate,
            Strategy::Gd(gd) => gd.config().learning_rate,
        }
    }

    /// Sampling scale: `noise_std` for ES, the current exploration step
    /// size for GD.
    pub fn exploration(&self) -> f64 {
        match self {
            Strategy::Es(es) => es.config().noise_std,
            Strategy::Gd(gd) => gd.exploration_step_size(),
        }
    }

    /// Samples the next generation (before bounding).
    pub fn propose<R: Rng>(&mut self, rng: &mut R) -> Vec<Individual> {
        match self {
            Strategy::Es(es) => es.propose(rng),
            Strategy::Gd(gd) => gd.propose(rng),
        }
    }

    /// Fitness of the centroid itself, when the strategy evaluates it and
    /// the run succeeded.
    pub fn centroid_fitness(&self, fitness: &[Option<f64>]) -> Option<f64> {
        match self {
            Strategy::Es(_) => None,
            Strategy::Gd(_) => fitness.first().copied().flatten(),
        }
    }

    /// Applies the update rule to the evaluated pending generation.
    ///
    /// `individuals` and `fitness` are both in run order; `None` marks a
    /// failed run, which counts as `worst` wherever a value is needed.
    pub fn update<R: Rng>(
        &mut self,
        individuals: &[&Individual],
        fitness: &[Option<f64>],
        worst: f64,
        rng: &mut R,
    ) -> Result<()> {
        match self {
            Strategy::Es(es) => es.update(fitness, worst),
            Strategy::Gd(gd) => {
                let evaluated: Vec<(&Individual, Option<f64>)> = individuals
                    .iter()
                    .copied()
                    .zip(fitness.iter().copied())
                    .collect();
                gd.update(&evaluated, rng).map(|_| ())
            }
        }
    }
}
