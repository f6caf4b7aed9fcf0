//! Optimizee: the black-box objective being optimized.
//!
//! Users implement [`Optimizee`]; [`FunctionOptimizee`] covers the common
//! case of a scalar function on a box domain.

mod function;
mod types;

pub use function::FunctionOptimizee;
pub use types::{EvalContext, Optimizee};
