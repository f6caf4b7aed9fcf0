//! GD configuration and update-rule variants.

use crate::error::{OptimError, Result};
use serde::{Deserialize, Serialize};

/// Update rule applied to the finite-difference gradient estimate.
///
/// # References
///
/// - Adam: Kingma & Ba (2015), *Adam: A Method for Stochastic Optimization*
/// - RMSProp: Tieleman & Hinton (2012), Lecture 6.5
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GdVariant {
    /// `centroid += lr * g`.
    Classic,

    /// `centroid += lr * (g + N(0, deviation))`; the exploration step size
    /// and the deviation both shrink by `stochastic_decay` each generation.
    Stochastic {
        stochastic_deviation: f64,
        stochastic_decay: f64,
    },

    /// Bias-corrected first/second moment estimates.
    Adam {
        first_order_decay: f64,
        second_order_decay: f64,
    },

    /// Moving average of the squared gradient.
    RmsProp { momentum_decay: f64 },
}

impl GdVariant {
    /// Stochastic variant with deviation 1.0 and decay 0.99.
    pub fn stochastic() -> Self {
        GdVariant::Stochastic {
            stochastic_deviation: 1.0,
            stochastic_decay: 0.99,
        }
    }

    /// Adam variant with both decays at 0.8.
    pub fn adam() -> Self {
        GdVariant::Adam {
            first_order_decay: 0.8,
            second_order_decay: 0.8,
        }
    }

    /// RMSProp variant with momentum decay 0.5.
    pub fn rms_prop() -> Self {
        GdVariant::RmsProp {
            momentum_decay: 0.5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GdVariant::Classic => "classic",
            GdVariant::Stochastic { .. } => "stochastic",
            GdVariant::Adam { .. } => "adam",
            GdVariant::RmsProp { .. } => "rms_prop",
        }
    }
}

impl Default for GdVariant {
    fn default() -> Self {
        GdVariant::Classic
    }
}

/// Configuration for the gradient-descent family.
///
/// Each generation evaluates the centroid plus `n_random_steps` perturbed
/// points, so the population size is `n_random_steps + 1`.
///
/// # Examples
///
/// ```
/// use u_blackopt::gd::{GdConfig, GdVariant};
///
/// let config = GdConfig::default()
///     .with_learning_rate(0.01)
///     .with_exploration_step_size(0.01)
///     .with_n_random_steps(5)
///     .with_variant(GdVariant::rms_prop());
/// assert_eq!(config.pop_size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GdConfig {
    pub learning_rate: f64,

    /// Standard deviation of the exploration perturbations.
    pub exploration_step_size: f64,

    /// Perturbed points evaluated alongside the centroid.
    pub n_random_steps: usize,

    /// Denominator guard for Adam and RMSProp.
    pub epsilon: f64,

    pub variant: GdVariant,
}

impl Default for GdConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            exploration_step_size: 0.01,
            n_random_steps: 5,
            epsilon: 1e-8,
            variant: GdVariant::Classic,
        }
    }
}

impl GdConfig {
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_exploration_step_size(mut self, step: f64) -> Self {
        self.exploration_step_size = step;
        self
    }

    pub fn with_n_random_steps(mut self, n: usize) -> Self {
        self.n_random_steps = n;
        self
    }

    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.epsilon = eps;
        self
    }

    pub fn with_variant(mut self, variant: GdVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Individuals per generation.
    pub fn pop_size(&self) -> usize {
        self.n_random_steps + 1
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| -> Result<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(OptimError::Configuration(format!(
                    "{name} must be positive, got {v}"
                )))
            }
        };
        let decay = |name: &str, v: f64| -> Result<()> {
            if (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(OptimError::Configuration(format!(
                    "{name} must be in [0, 1), got {v}"
                )))
            }
        };

        positive("learning_rate", self.learning_rate)?;
        positive("exploration_step_size", self.exploration_step_size)?;
        positive("epsilon", self.epsilon)?;
        if self.n_random_steps == 0 {
            return Err(OptimError::Configuration(
                "n_random_steps must be at least 1".into(),
            ));
        }

        match self.variant {
            GdVariant::Classic => {}
            GdVariant::Stochastic {
                stochastic_deviation,
                stochastic_decay,
            } => {
                if !(stochastic_deviation >= 0.0 && stochastic_deviation.is_finite()) {
                    return Err(OptimError::Configuration(format!(
                        "stochastic_deviation must be non-negative, got {stochastic_deviation}"
                    )));
                }
                if !(stochastic_decay > 0.0 && stochastic_decay <= 1.0) {
                    return Err(OptimError::Configuration(format!(
                        "stochastic_decay must be in (0, 1], got {stochastic_decay}"
                    )));
                }
            }
            GdVariant::Adam {
                first_order_decay,
                second_order_decay,
            } => {
                decay("first_order_decay", first_order_decay)?;
                decay("second_order_decay", second_order_decay)?;
            }
            GdVariant::RmsProp { momentum_decay } => {
                decay("momentum_decay", momentum_decay)?;
            }
        }
        Ok(())
    }
}
