//! Deterministic seeding.
//!
//! The optimizer owns exactly one [`OptimRng`]; nothing else touches it.
//! Evaluations get their own seed derived from `(base, generation, run_id)`,
//! so their results do not depend on execution order.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// RNG used throughout the crate. Its state serializes, which is what makes
/// checkpoints reproducible.
pub type OptimRng = ChaCha8Rng;

/// Creates the crate RNG from a 64-bit seed.
pub fn create_rng(seed: u64) -> OptimRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derives a per-run evaluation seed.
///
/// # Examples
///
/// ```
/// use u_blackopt::base::derive_seed;
///
/// assert_eq!(derive_seed(42, 0, 3), derive_seed(42, 0, 3));
/// assert_ne!(derive_seed(42, 0, 3), derive_seed(42, 1, 3));
/// ```
pub fn derive_seed(base: u64, generation: usize, run_id: usize) -> u64 {
    mix(mix(mix(base) ^ generation as u64) ^ run_id as u64)
}
