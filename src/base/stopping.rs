//! Stopping criterion shared by every strategy.

use crate::error::{OptimError, Result};
use serde::{Deserialize, Serialize};

/// When to transition the optimizer to `STOPPED`.
///
/// The loop stops as soon as either condition holds after a generation has
/// been processed:
///
/// - `generation >= n_iteration`
/// - `best weighted fitness >= stop_criterion`
///
/// # Examples
///
/// ```
/// use u_blackopt::base::StopCriterion;
///
/// let stop = StopCriterion::new(100).with_stop_criterion(5.0);
/// assert!(stop.should_stop(7, 5.1).is_some());
/// assert!(stop.should_stop(7, 4.9).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopCriterion {
    /// Maximum number of generations to evaluate.
    pub n_iteration: usize,

    /// Weighted fitness at or above which the run is considered solved.
    ///
    /// Defaults to `+inf` (never fires).
    #[serde(with = "infinite_f64")]
    pub stop_criterion: f64,
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxGenerations,
    FitnessThreshold,
    /// `end()` was called while the loop was still running.
    Ended,
}

impl Default for StopCriterion {
    fn default() -> Self {
        Self {
            n_iteration: 100,
            stop_criterion: f64::INFINITY,
        }
    }
}

impl StopCriterion {
    pub fn new(n_iteration: usize) -> Self {
        Self {
            n_iteration,
            ..Self::default()
        }
    }

    pub fn with_stop_criterion(mut self, threshold: f64) -> Self {
        self.stop_criterion = threshold;
        self
    }

    /// Evaluates the criterion. `generation` is the number of generations
    /// processed so far.
    pub fn should_stop(&self, generation: usize, best_fitness: f64) -> Option<StopReason> {
        if best_fitness >= self.stop_criterion {
            Some(StopReason::FitnessThreshold)
        } else if generation >= self.n_iteration {
            Some(StopReason::MaxGenerations)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_iteration == 0 {
            return Err(OptimError::Configuration(
                "n_iteration must be at least 1".into(),
            ));
        }
        if self.stop_criterion.is_nan() {
            return Err(OptimError::Configuration(
                "stop_criterion must not be NaN".into(),
            ));
        }
        Ok(())
    }
}

/// JSON has no infinity literal; encode `±inf` as strings.
mod infinite_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_infinite() {
            s.serialize_str(if *v > 0.0 { "inf" } else { "-inf" })
        } else {
            s.serialize_f64(*v)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Str(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Num(v) => Ok(v),
            Repr::Str(s) => match s.as_str() {
                "inf" | "+inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number or \"inf\", got {other:?}"
                ))),
            },
        }
    }
}
