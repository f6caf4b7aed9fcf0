//! Shared building blocks for every strategy and dispatcher.
//!
//! # Key Types
//!
//! - [`Individual`], [`RunId`], [`Population`]: what gets evaluated
//! - [`FitnessOutcome`]: what comes back from one evaluation
//! - [`FitnessWeights`]: folds raw fitness into one maximized scalar
//! - [`StopCriterion`]: generation budget and fitness threshold
//! - [`Bounding`], [`BoxBounds`]: domain repair
//! - [`OptimRng`], [`derive_seed`]: deterministic randomness

mod bounds;
mod seeding;
mod stopping;
mod types;
mod weights;

pub use bounds::{BoundMode, Bounding, BoxBounds};
pub use seeding::{create_rng, derive_seed, OptimRng};
pub use stopping::{StopCriterion, StopReason};
pub use types::{FitnessOutcome, Individual, Population, RunId};
pub use weights::FitnessWeights;
