//! Gradient-descent family.
//!
//! Each generation evaluates the centroid and `n_random_steps` Gaussian
//! perturbations of it, fits a least-squares gradient to the fitness
//! deltas, and applies one of four update rules ([`GdVariant`]): classic,
//! stochastic, Adam, or RMSProp.

mod config;
mod gradient;
mod strategy;
mod update;

pub use config::{GdConfig, GdVariant};
pub use gradient::estimate_gradient;
pub use strategy::GdStrategy;
pub use update::{adam_step, rms_prop_step, Moments};
