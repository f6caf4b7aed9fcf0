//! The contract between the optimization loop and a user objective.

use crate::base::{Bounding, Individual, RunId};
use rand::Rng;
use std::sync::Arc;

/// Everything one evaluation gets to see.
///
/// The context is read-only; evaluations share no mutable state, so they
/// can run in any order or concurrently.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub generation: usize,
    pub run_id: RunId,

    /// Per-run seed derived from the loop's base seed, generation, and
    /// run-id. Noisy objectives should draw all their randomness from it.
    pub seed: u64,

    pub individual: &'a Individual,
}

/// A black-box objective.
///
/// # Implementing
///
/// ```ignore
/// struct Sphere;
///
/// impl Optimizee for Sphere {
///     fn name(&self) -> &str { "sphere" }
///     fn create_individual<R: Rng>(&self, rng: &mut R) -> Individual {
///         Individual::new((0..2).map(|_| rng.random_range(-5.0..5.0)).collect())
///     }
///     fn simulate(&self, ctx: &EvalContext<'_>) -> Result<Vec<f64>, String> {
///         Ok(vec![ctx.individual.iter().map(|x| x * x).sum()])
///     }
/// }
/// ```
pub trait Optimizee: Send + Sync {
    /// Name forwarded to the recorder.
    fn name(&self) -> &str;

    /// Parameters forwarded to the recorder.
    fn params(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Samples a random starting point.
    fn create_individual<R: Rng>(&self, rng: &mut R) -> Individual;

    /// Evaluates one individual. A pure function of the context.
    ///
    /// Returns the raw fitness vector; `Err` marks the run as failed.
    fn simulate(&self, ctx: &EvalContext<'_>) -> Result<Vec<f64>, String>;

    /// Optional domain repair applied to every individual the optimizer
    /// emits.
    fn bounding(&self) -> Option<Arc<dyn Bounding>> {
        None
    }
}
