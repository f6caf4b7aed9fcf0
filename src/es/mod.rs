//! Evolution Strategies.
//!
//! A natural-evolution-strategy gradient estimator: perturb the centroid with
//! Gaussian noise, evaluate, and move the centroid along the
//! fitness-weighted sum of perturbations.
//!
//! # Key Types
//!
//! - [`EsConfig`]: learning rate, noise scale, population size, mirroring,
//!   fitness shaping
//! - [`EsStrategy`]: centroid plus pending perturbations
//!
//! # References
//!
//! - Salimans et al. (2017), *Evolution Strategies as a Scalable
//!   Alternative to Reinforcement Learning*
//! - Wierstra et al. (2014), *Natural Evolution Strategies*

mod config;
mod shaping;
mod strategy;

pub use config::EsConfig;
pub use shaping::{rank_utilities, standardize};
pub use strategy::{es_update, sample_noise, EsStrategy};
