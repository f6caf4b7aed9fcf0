//! ES configuration.

use crate::error::{OptimError, Result};
use serde::{Deserialize, Serialize};

/// Hyperparameters of the natural evolution strategy.
///
/// # Examples
///
/// ```
/// use u_blackopt::es::EsConfig;
///
/// let config = EsConfig::default()
///     .with_learning_rate(0.1)
///     .with_noise_std(1.0)
///     .with_pop_size(20)
///     .with_mirrored_sampling(true)
///     .with_fitness_shaping(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EsConfig {
    /// Step size applied to the gradient estimate.
    pub learning_rate: f64,

    /// Standard deviation of the sampling perturbation. Must be positive.
    pub noise_std: f64,

    /// Individuals per generation. Must be even when mirrored sampling is on.
    pub pop_size: usize,

    /// Pair every perturbation `eps` with `-eps`.
    ///
    /// Pairs are adjacent: runs `2k` and `2k + 1` share one draw.
    pub mirrored_sampling_enabled: bool,

    /// Replace fitness by centered rank utilities before the update.
    pub fitness_shaping_enabled: bool,

    /// Standardize fitness (zero mean, unit variance) when shaping is off.
    pub fitness_standardization_enabled: bool,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            noise_std: 1.0,
            pop_size: 20,
            mirrored_sampling_enabled: true,
            fitness_shaping_enabled: true,
            fitness_standardization_enabled: false,
        }
    }
}

impl EsConfig {
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_noise_std(mut self, std: f64) -> Self {
        self.noise_std = std;
        self
    }

    pub fn with_pop_size(mut self, n: usize) -> Self {
        self.pop_size = n;
        self
    }

    pub fn with_mirrored_sampling(mut self, enabled: bool) -> Self {
        self.mirrored_sampling_enabled = enabled;
        self
    }

    pub fn with_fitness_shaping(mut self, enabled: bool) -> Self {
        self.fitness_shaping_enabled = enabled;
        self
    }

    pub fn with_fitness_standardization(mut self, enabled: bool) -> Self {
        self.fitness_standardization_enabled = enabled;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(OptimError::Configuration(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.noise_std > 0.0 && self.noise_std.is_finite()) {
            return Err(OptimError::Configuration(format!(
                "noise_std must be positive, got {}",
                self.noise_std
            )));
        }
        if self.pop_size == 0 {
            return Err(OptimError::Configuration("pop_size must be positive".into()));
        }
        if self.mirrored_sampling_enabled && self.pop_size % 2 != 0 {
            return Err(OptimError::Configuration(format!(
                "pop_size must be even with mirrored sampling, got {}",
                self.pop_size
            )));
        }
        Ok(())
    }
}
