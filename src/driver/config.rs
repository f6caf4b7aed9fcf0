//! Driving-loop configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How many times to re-dispatch runs that did not produce a usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra dispatch attempts per generation for missing (and, with
    /// `retry_failed`, failed) runs.
    pub max_redispatch: usize,

    /// Also re-dispatch runs whose evaluation reported a failure.
    pub retry_failed: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_redispatch: 1,
            retry_failed: true,
        }
    }
}

impl RetryPolicy {
    /// Never re-dispatch.
    pub fn none() -> Self {
        Self {
            max_redispatch: 0,
            retry_failed: false,
        }
    }
}

/// What to do with runs still missing after every re-dispatch attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Treat them as failed runs and continue with the generation.
    #[default]
    Penalize,

    /// Stop the loop with [`OptimError::DispatchTimeout`](crate::error::OptimError::DispatchTimeout).
    Abort,
}

/// Configuration for [`Experiment`](super::Experiment).
///
/// # Examples
///
/// ```
/// use u_blackopt::driver::{LoopConfig, RetryPolicy, TimeoutPolicy};
///
/// let config = LoopConfig::default()
///     .with_retry(RetryPolicy::none())
///     .with_timeout_policy(TimeoutPolicy::Abort);
/// assert_eq!(config.retry.max_redispatch, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub retry: RetryPolicy,
    pub on_timeout: TimeoutPolicy,

    /// Where to write a checkpoint after every processed generation.
    pub checkpoint_path: Option<PathBuf>,
}

impl LoopConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.on_timeout = policy;
        self
    }

    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoopConfig::default();
        assert_eq!(config.retry.max_redispatch, 1);
        assert!(config.retry.retry_failed);
        assert_eq!(config.on_timeout, TimeoutPolicy::Penalize);
        assert!(config.checkpoint_path.is_none());
    }

    #[test]
    fn test_from_partial_json() {
        let config: LoopConfig = serde_json::from_str(r#"{"on_timeout": "abort"}"#).unwrap();
        assert_eq!(config.on_timeout, TimeoutPolicy::Abort);
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
