//! ES sampling and centroid update.

use super::config::EsConfig;
use super::shaping::{rank_utilities, standardize};
use crate::base::Individual;
use crate::error::{OptimError, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Draws `pop_size` standard-normal perturbations of dimension `dim`.
///
/// With `mirrored`, only `pop_size / 2` vectors are drawn and each one is
/// immediately followed by its negation: `[e1, -e1, e2, -e2, ...]`.
pub fn sample_noise<R: Rng>(
    rng: &mut R,
    dim: usize,
    pop_size: usize,
    mirrored: bool,
) -> Vec<Vec<f64>> {
    let draw = |rng: &mut R| -> Vec<f64> {
        (0..dim).map(|_| rng.sample::<f64, _>(StandardNormal)).collect()
    };

    if mirrored {
        let mut noise = Vec::with_capacity(pop_size);
        for _ in 0..pop_size / 2 {
            let eps = draw(rng);
            let neg: Vec<f64> = eps.iter().map(|v| -v).collect();
            noise.push(eps);
            noise.push(neg);
        }
        noise
    } else {
        (0..pop_size).map(|_| draw(rng)).collect()
    }
}

/// The NES update:
///
/// ```text
/// centroid' = centroid + lr / (n * noise_std) * sum_i(f_i * eps_i)
/// ```
///
/// where `n = noise.len()` and `f_i` is the (shaped) fitness of run `i`.
pub fn es_update(
    centroid: &[f64],
    noise: &[Vec<f64>],
    fitness: &[f64],
    learning_rate: f64,
    noise_std: f64,
) -> Vec<f64> {
    let n = noise.len() as f64;
    let scale = learning_rate / (n * noise_std);
    let mut next = centroid.to_vec();
    for (eps, f) in noise.iter().zip(fitness) {
        for (c, e) in next.iter_mut().zip(eps) {
            *c += scale * f * e;
        }
    }
    next
}

/// Natural evolution strategy state: the centroid and the perturbations of
/// the generation currently out for evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsStrategy {
    config: EsConfig,
    centroid: Vec<f64>,
    noise: Vec<Vec<f64>>,
}

impl EsStrategy {
    pub fn new(config: EsConfig, centroid: Vec<f64>) -> Self {
        Self {
            config,
            centroid,
            noise: Vec::new(),
        }
    }

    pub fn config(&self) -> &EsConfig {
        &self.config
    }

    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    pub(crate) fn set_centroid(&mut self, centroid: Vec<f64>) {
        self.centroid = centroid;
    }

    /// Perturbations of the pending generation, in run order.
    pub fn noise(&self) -> &[Vec<f64>] {
        &self.noise
    }

    /// Samples the next generation around the centroid (unbounded).
    pub fn propose<R: Rng>(&mut self, rng: &mut R) -> Vec<Individual> {
        self.noise = sample_noise(
            rng,
            self.centroid.len(),
            self.config.pop_size,
            self.config.mirrored_sampling_enabled,
        );
        self.noise
            .iter()
            .map(|eps| {
                Individual::new(
                    self.centroid
                        .iter()
                        .zip(eps)
                        .map(|(c, e)| c + self.config.noise_std * e)
                        .collect(),
                )
            })
            .collect()
    }

    /// Transforms weighted fitness according to the shaping settings.
    ///
    /// `None` marks a failed run. Under rank shaping failed runs take the
    /// lowest ranks, below every successful run; otherwise they count as
    /// `worst`.
    pub fn shape(&self, fitness: &[Option<f64>], worst: f64) -> Vec<f64> {
        if self.config.fitness_shaping_enabled {
            let ranked: Vec<f64> = fitness
                .iter()
                .map(|f| f.unwrap_or(f64::NEG_INFINITY))
                .collect();
            return rank_utilities(&ranked);
        }
        let filled: Vec<f64> = fitness.iter().map(|f| f.unwrap_or(worst)).collect();
        if self.config.fitness_standardization_enabled {
            standardize(&filled)
        } else {
            filled
        }
    }

    /// Moves the centroid given the weighted fitness of the pending
    /// generation, in run order.
    pub fn update(&mut self, fitness: &[Option<f64>], worst: f64) -> Result<()> {
        if fitness.len() != self.noise.len() {
            return Err(OptimError::Configuration(format!(
                "expected {} fitness values, got {}",
                self.noise.len(),
                fitness.len()
            )));
        }
        let shaped = self.shape(fitness, worst);
        self.centroid = es_update(
            &self.centroid,
            &self.noise,
            &shaped,
            self.config.learning_rate,
            self.config.noise_std,
        );
        Ok(())
    }
}
