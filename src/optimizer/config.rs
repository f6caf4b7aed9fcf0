//! Optimizer configuration.
//!
//! [`OptimizerConfig`] selects the strategy through a tagged
//! [`StrategyConfig`] and carries the settings every strategy shares.

use crate::base::StopCriterion;
use crate::error::{OptimError, Result};
use crate::es::EsConfig;
use crate::gd::GdConfig;
use serde::{Deserialize, Serialize};

/// Which strategy to run, with its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Es(EsConfig),
    Gd(GdConfig),
}

impl StrategyConfig {
    /// Individuals per generation.
    pub fn pop_size(&self) -> usize {
        match self {
            StrategyConfig::Es(c) => c.pop_size,
            StrategyConfig::Gd(c) => c.pop_size(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::Es(c) => c.validate(),
            StrategyConfig::Gd(c) => c.validate(),
        }
    }
}

/// Fitness assigned to a run whose evaluation failed or never reported.
///
/// Failed runs never count towards best-so-far; this value only feeds the
/// strategy update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorstFitness {
    /// The lowest weighted fitness among the generation's successful runs.
    #[default]
    GenerationMinimum,

    /// A fixed weighted fitness value.
    Value { value: f64 },
}

/// Complete optimizer configuration.
///
/// # Examples
///
/// ```
/// use u_blackopt::base::StopCriterion;
/// use u_blackopt::es::EsConfig;
/// use u_blackopt::optimizer::{OptimizerConfig, StrategyConfig};
///
/// let config = OptimizerConfig::new(StrategyConfig::Es(EsConfig::default()))
///     .with_stop(StopCriterion::new(1000))
///     .with_seed(1234);
/// assert!(config.validate().is_ok());
///
/// let json = r#"{
///     "strategy": {"kind": "gd", "variant": {"kind": "rms_prop", "momentum_decay": 0.5}},
///     "stop": {"n_iteration": 100, "stop_criterion": "inf"},
///     "seed": 99
/// }"#;
/// let config = OptimizerConfig::from_json_str(json).unwrap();
/// assert_eq!(config.strategy.pop_size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub stop: StopCriterion,

    /// Seed of the optimizer's private RNG.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub failure_policy: WorstFitness,
}

impl OptimizerConfig {
    pub fn new(strategy: StrategyConfig) -> Self {
        Self {
            strategy,
            stop: StopCriterion::default(),
            seed: 0,
            failure_policy: WorstFitness::default(),
        }
    }

    pub fn with_stop(mut self, stop: StopCriterion) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_failure_policy(mut self, policy: WorstFitness) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        self.stop.validate()?;
        if let WorstFitness::Value { value } = self.failure_policy {
            if !value.is_finite() {
                return Err(OptimError::Configuration(format!(
                    "worst fitness value must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gd::GdVariant;

    #[test]
    fn test_json_es_defaults() {
        let config =
            OptimizerConfig::from_json_str(r#"{"strategy": {"kind": "es", "pop_size": 4}}"#)
                .unwrap();
        assert_eq!(config.strategy.pop_size(), 4);
        assert_eq!(config.stop.n_iteration, 100);
        assert_eq!(config.failure_policy, WorstFitness::GenerationMinimum);
    }

    #[test]
    fn test_json_rejects_invalid() {
        let err = OptimizerConfig::from_json_str(r#"{"strategy": {"kind": "es", "pop_size": 3}}"#);
        assert!(matches!(err, Err(OptimError::Configuration(_))));
    }

    #[test]
    fn test_non_finite_worst_rejected() {
        let config = OptimizerConfig::new(StrategyConfig::Gd(GdConfig::default()))
            .with_failure_policy(WorstFitness::Value {
                value: f64::NEG_INFINITY,
            });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_gd() {
        let config = OptimizerConfig::new(StrategyConfig::Gd(
            GdConfig::default().with_variant(GdVariant::adam()),
        ))
        .with_seed(7);
        let json = serde_json::to_string(&config).unwrap();
        let back = OptimizerConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
