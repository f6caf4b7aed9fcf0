//! Domain repair for individuals.
//!
//! A bounding function maps an individual that may lie outside the valid
//! domain back into it. Out-of-domain values are silently corrected; only a
//! failure of the bounding function itself is an error, and that error is
//! fatal.

use super::types::Individual;
use serde::{Deserialize, Serialize};

/// Repairs out-of-domain individuals.
///
/// Implementations must be pure: the same input always yields the same
/// output, and an already-valid individual comes back unchanged
/// (`bound(bound(x)) == bound(x)`).
///
/// Closures `Fn(&Individual) -> Result<Individual, String>` implement this
/// trait directly.
pub trait Bounding: Send + Sync {
    fn bound(&self, individual: &Individual) -> Result<Individual, String>;
}

impl<F> Bounding for F
where
    F: Fn(&Individual) -> Result<Individual, String> + Send + Sync,
{
    fn bound(&self, individual: &Individual) -> Result<Individual, String> {
        self(individual)
    }
}

/// How [`BoxBounds`] repairs a coordinate outside `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundMode {
    /// Clamp to the nearest bound.
    #[default]
    Clip,

    /// Mirror back into the interval, folding as many times as needed.
    Reflect,
}

/// Axis-aligned box domain.
///
/// # Examples
///
/// ```
/// use u_blackopt::base::{Bounding, BoxBounds, BoundMode, Individual};
///
/// let bounds = BoxBounds::uniform(2, -5.0, 5.0).unwrap();
/// let fixed = bounds.bound(&Individual::new(vec![7.0, -1.0])).unwrap();
/// assert_eq!(fixed.as_slice(), &[5.0, -1.0]);
///
/// let reflect = bounds.with_mode(BoundMode::Reflect);
/// let fixed = reflect.bound(&Individual::new(vec![7.0, -1.0])).unwrap();
/// assert_eq!(fixed.as_slice(), &[3.0, -1.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxBounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
    mode: BoundMode,
}

impl BoxBounds {
    /// Creates bounds; each `lower[i] <= upper[i]` and all finite.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, String> {
        if lower.len() != upper.len() {
            return Err(format!(
                "lower has {} entries but upper has {}",
                lower.len(),
                upper.len()
            ));
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(format!("invalid bound at index {i}: [{lo}, {hi}]"));
            }
        }
        Ok(Self {
            lower,
            upper,
            mode: BoundMode::Clip,
        })
    }

    /// Same interval on every axis.
    pub fn uniform(dim: usize, lower: f64, upper: f64) -> Result<Self, String> {
        Self::new(vec![lower; dim], vec![upper; dim])
    }

    pub fn with_mode(mut self, mode: BoundMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Returns `true` if every coordinate lies inside the box.
    pub fn contains(&self, individual: &Individual) -> bool {
        individual.dim() == self.dim()
            && individual
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

fn reflect(v: f64, lo: f64, hi: f64) -> f64 {
    let width = hi - lo;
    if width == 0.0 {
        return lo;
    }
    let period = 2.0 * width;
    let offset = (v - lo).rem_euclid(period);
    if offset <= width {
        lo + offset
    } else {
        hi - (offset - width)
    }
}

impl Bounding for BoxBounds {
    fn bound(&self, individual: &Individual) -> Result<Individual, String> {
        if individual.dim() != self.dim() {
            return Err(format!(
                "individual has {} dimension(s), bounds have {}",
                individual.dim(),
                self.dim()
            ));
        }
        if !individual.is_finite() {
            return Err("cannot bound a non-finite individual".into());
        }
        let values = individual
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| {
                if v >= lo && v <= hi {
                    v
                } else {
                    match self.mode {
                        BoundMode::Clip => v.clamp(lo, hi),
                        BoundMode::Reflect => reflect(v, lo, hi),
                    }
                }
            })
            .collect();
        Ok(Individual::new(values))
    }
}
