//! Error taxonomy for the optimization loop.
//!
//! Per-run evaluation failures are *not* errors: they travel as
//! [`FitnessOutcome::Failed`](crate::base::FitnessOutcome::Failed) values and
//! are absorbed into the fitness signal. Everything in [`OptimError`] aborts
//! the loop with a user-facing message.

use crate::base::RunId;
use thiserror::Error;

/// Fatal errors surfaced by the optimizer, dispatchers, and driver loop.
#[derive(Debug, Error)]
pub enum OptimError {
    /// Invalid hyperparameters, a failing bounding function, or fitness
    /// vectors that do not match the configured weights.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A generation's evaluations did not complete within the poll bound,
    /// even after the configured re-dispatch attempts.
    #[error("generation {generation}: {} run(s) never reported: {missing:?}", .missing.len())]
    DispatchTimeout {
        generation: usize,
        missing: Vec<RunId>,
    },

    /// Every run of a generation failed, leaving no fitness signal.
    #[error("generation {generation}: every evaluation failed")]
    AllRunsFailed { generation: usize },

    /// The transport between dispatcher and workers is broken.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OptimError>;
