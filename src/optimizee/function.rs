//! Closure-backed optimizee over a box domain.

use super::types::{EvalContext, Optimizee};
use crate::base::{create_rng, Bounding, BoxBounds, Individual, OptimRng};
use rand::Rng;
use std::sync::Arc;

type ObjectiveFn = dyn Fn(&[f64], &mut OptimRng) -> f64 + Send + Sync;

/// Wraps a scalar objective `f(x, rng)` defined on a [`BoxBounds`] domain.
///
/// The `rng` handed to the objective is seeded from the run's derived seed,
/// so noisy objectives stay reproducible regardless of evaluation order.
/// Non-finite objective values are reported as failed runs.
///
/// # Examples
///
/// ```
/// use u_blackopt::base::BoxBounds;
/// use u_blackopt::optimizee::FunctionOptimizee;
///
/// let bounds = BoxBounds::uniform(2, -5.0, 5.0).unwrap();
/// let sphere = FunctionOptimizee::new("sphere", bounds, |x, _rng| {
///     x.iter().map(|v| v * v).sum()
/// });
/// ```
#[derive(Clone)]
pub struct FunctionOptimizee {
    name: String,
    bounds: Arc<BoxBounds>,
    objective: Arc<ObjectiveFn>,
}

impl FunctionOptimizee {
    pub fn new<F>(name: impl Into<String>, bounds: BoxBounds, objective: F) -> Self
    where
        F: Fn(&[f64], &mut OptimRng) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            bounds: Arc::new(bounds),
            objective: Arc::new(objective),
        }
    }

    pub fn bounds(&self) -> &BoxBounds {
        &self.bounds
    }

    pub fn dim(&self) -> usize {
        self.bounds.dim()
    }
}

impl std::fmt::Debug for FunctionOptimizee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionOptimizee")
            .field("name", &self.name)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl Optimizee for FunctionOptimizee {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "dim": self.dim(),
            "lower": self.bounds.lower(),
            "upper": self.bounds.upper(),
        })
    }

    fn create_individual<R: Rng>(&self, rng: &mut R) -> Individual {
        let values = self
            .bounds
            .lower()
            .iter()
            .zip(self.bounds.upper())
            .map(|(&lo, &hi)| if lo < hi { rng.random_range(lo..hi) } else { lo })
            .collect();
        Individual::new(values)
    }

    fn simulate(&self, ctx: &EvalContext<'_>) -> Result<Vec<f64>, String> {
        if ctx.individual.dim() != self.dim() {
            return Err(format!(
                "expected {} parameters, got {}",
                self.dim(),
                ctx.individual.dim()
            ));
        }
        let mut rng = create_rng(ctx.seed);
        let value = (self.objective)(ctx.individual, &mut rng);
        if value.is_finite() {
            Ok(vec![value])
        } else {
            Err(format!("objective returned non-finite value {value}"))
        }
    }

    fn bounding(&self) -> Option<Arc<dyn Bounding>> {
        Some(self.bounds.clone())
    }
}
