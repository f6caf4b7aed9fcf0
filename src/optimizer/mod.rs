//! Optimizer: the generation-driven state machine.
//!
//! An [`Optimizer`] owns all algorithm state. Each call to
//! [`Optimizer::post_process`] applies fitness weights, updates
//! best-so-far, runs the strategy's update rule, bounds the next
//! population, and evaluates the stopping criterion.
//!
//! # Key Types
//!
//! - [`OptimizerConfig`] / [`StrategyConfig`]: tagged strategy selection
//! - [`Strategy`]: ES or GD state behind one update capability
//! - [`Phase`]: `Initialized -> Running -> Stopped`
//! - [`GenerationRecord`], [`OptimizerSummary`]: reporting
//! - [`Checkpoint`]: resumable state

mod checkpoint;
mod config;
mod engine;
mod strategy;
mod types;

pub use checkpoint::Checkpoint;
pub use config::{OptimizerConfig, StrategyConfig, WorstFitness};
pub use engine::Optimizer;
pub use strategy::Strategy;
pub use types::{BestSoFar, GenerationRecord, OptimizerSummary, Phase};
