//! Driver: the loop that connects an optimizer, a dispatcher, and a
//! trajectory store.
//!
//! # Key Types
//!
//! - [`Experiment`]: owns the store, runs the generation loop
//! - [`LoopConfig`]: [`RetryPolicy`], [`TimeoutPolicy`], checkpoint path
//! - [`LoopResult`]: summary plus dispatch statistics

mod config;
mod experiment;
mod types;

pub use config::{LoopConfig, RetryPolicy, TimeoutPolicy};
pub use experiment::Experiment;
pub use types::LoopResult;
