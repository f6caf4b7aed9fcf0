//! Fitness transforms applied within one generation before the ES update.
//!
//! # References
//!
//! Wierstra et al. (2014), "Natural Evolution Strategies", JMLR 15.

/// Rank-based utilities that sum to zero.
///
/// The individual with rank `k` (1 = best, i.e. highest weighted fitness)
/// receives
///
/// ```text
/// u_k = max(0, ln(n/2 + 1) - ln k) / sum_j max(0, ln(n/2 + 1) - ln j) - 1/n
/// ```
///
/// Ties keep their input order. The result is invariant to any monotone
/// rescaling of the fitness values.
pub fn rank_utilities(fitness: &[f64]) -> Vec<f64> {
    let n = fitness.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        fitness[b]
            .partial_cmp(&fitness[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let log_half = (n as f64 / 2.0 + 1.0).ln();
    let raw: Vec<f64> = (1..=n)
        .map(|k| (log_half - (k as f64).ln()).max(0.0))
        .collect();
    let total: f64 = raw.iter().sum();

    let mut utilities = vec![0.0; n];
    for (rank, &idx) in order.iter().enumerate() {
        utilities[idx] = raw[rank] / total - 1.0 / n as f64;
    }
    utilities
}

/// Zero-mean, unit-variance rescaling. A constant input maps to all zeros.
pub fn standardize(fitness: &[f64]) -> Vec<f64> {
    let n = fitness.len();
    if n == 0 {
        return Vec::new();
    }
    let mean = fitness.iter().sum::<f64>() / n as f64;
    let var = fitness.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n as f64;
    let std = var.sqrt();
    if std < 1e-12 {
        return vec![0.0; n];
    }
    fitness.iter().map(|f| (f - mean) / std).collect()
}
