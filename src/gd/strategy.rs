//! GD sampling and centroid update.

use super::config::{GdConfig, GdVariant};
use super::gradient::estimate_gradient;
use super::update::{adam_step, rms_prop_step, Moments};
use crate::base::Individual;
use crate::error::{OptimError, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Gradient-descent state: centroid, the current (possibly decayed)
/// exploration scale, and the variant's moment buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdStrategy {
    config: GdConfig,
    centroid: Vec<f64>,
    exploration_step_size: f64,
    stochastic_deviation: f64,
    moments: Moments,
}

impl GdStrategy {
    pub fn new(config: GdConfig, centroid: Vec<f64>) -> Self {
        let dim = centroid.len();
        let moments = match config.variant {
            GdVariant::Adam { .. } => Moments::Adam {
                first: vec![0.0; dim],
                second: vec![0.0; dim],
                steps: 0,
            },
            GdVariant::RmsProp { .. } => Moments::RmsProp {
                mean_square: vec![0.0; dim],
            },
            GdVariant::Classic | GdVariant::Stochastic { .. } => Moments::None,
        };
        let stochastic_deviation = match config.variant {
            GdVariant::Stochastic {
                stochastic_deviation,
                ..
            } => stochastic_deviation,
            _ => 0.0,
        };
        Self {
            exploration_step_size: config.exploration_step_size,
            stochastic_deviation,
            config,
            centroid,
            moments,
        }
    }

    pub fn config(&self) -> &GdConfig {
        &self.config
    }

    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    pub(crate) fn set_centroid(&mut self, centroid: Vec<f64>) {
        self.centroid = centroid;
    }

    /// Current exploration scale (decays under the stochastic variant).
    pub fn exploration_step_size(&self) -> f64 {
        self.exploration_step_size
    }

    pub fn moments(&self) -> &Moments {
        &self.moments
    }

    /// The centroid followed by `n_random_steps` Gaussian perturbations of
    /// it (unbounded).
    pub fn propose<R: Rng>(&mut self, rng: &mut R) -> Vec<Individual> {
        let mut population = Vec::with_capacity(self.config.pop_size());
        population.push(Individual::new(self.centroid.clone()));
        for _ in 0..self.config.n_random_steps {
            let values = self
                .centroid
                .iter()
                .map(|c| c + self.exploration_step_size * rng.sample::<f64, _>(StandardNormal))
                .collect();
            population.push(Individual::new(values));
        }
        population
    }

    /// Applies one update from the evaluated pending generation.
    ///
    /// `evaluated` is in run order; its first entry is the centroid run and
    /// `None` marks a failed run. Failed perturbations are left out of the
    /// gradient fit. When the centroid run failed, or no perturbation
    /// succeeded, there is no baseline to difference against: the state is
    /// left untouched and `None` is returned. Otherwise returns the gradient
    /// estimate.
    pub fn update<R: Rng>(
        &mut self,
        evaluated: &[(&Individual, Option<f64>)],
        rng: &mut R,
    ) -> Result<Option<Vec<f64>>> {
        let Some(((centroid_ind, centroid_fitness), perturbed)) = evaluated.split_first() else {
            return Err(OptimError::Configuration(
                "gradient update needs the centroid run".into(),
            ));
        };
        let Some(centroid_fitness) = *centroid_fitness else {
            warn!("centroid run failed, skipping gradient step");
            return Ok(None);
        };
        let samples: Vec<(&[f64], f64)> = perturbed
            .iter()
            .filter_map(|(ind, f)| f.map(|f| (ind.as_slice(), f)))
            .collect();
        if samples.is_empty() {
            warn!("every perturbed run failed, skipping gradient step");
            return Ok(None);
        }
        let gradient = estimate_gradient(centroid_ind, centroid_fitness, &samples)?;

        let lr = self.config.learning_rate;
        let eps = self.config.epsilon;
        let delta: Vec<f64> = match (self.config.variant, &mut self.moments) {
            (GdVariant::Classic, _) => gradient.iter().map(|g| lr * g).collect(),
            (
                GdVariant::Stochastic {
                    stochastic_decay, ..
                },
                _,
            ) => {
                let deviation = self.stochastic_deviation;
                let delta = gradient
                    .iter()
                    .map(|g| lr * (g + deviation * rng.sample::<f64, _>(StandardNormal)))
                    .collect();
                self.stochastic_deviation *= stochastic_decay;
                self.exploration_step_size *= stochastic_decay;
                delta
            }
            (
                GdVariant::Adam {
                    first_order_decay,
                    second_order_decay,
                },
                Moments::Adam {
                    first,
                    second,
                    steps,
                },
            ) => adam_step(
                &gradient,
                first,
                second,
                steps,
                first_order_decay,
                second_order_decay,
                lr,
                eps,
            ),
            (GdVariant::RmsProp { momentum_decay }, Moments::RmsProp { mean_square }) => {
                rms_prop_step(&gradient, mean_square, momentum_decay, lr, eps)
            }
            (variant, moments) => {
                return Err(OptimError::Configuration(format!(
                    "{} update cannot use {moments:?} state",
                    variant.name()
                )))
            }
        };

        self.centroid = centroid_ind
            .iter()
            .zip(&delta)
            .map(|(c, d)| c + d)
            .collect();
        Ok(Some(gradient))
    }
}
