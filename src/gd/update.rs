//! Update rules and their moment buffers.

use serde::{Deserialize, Serialize};

/// Per-variant state carried across generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Moments {
    None,
    Adam {
        first: Vec<f64>,
        second: Vec<f64>,
        /// Number of updates applied so far (for bias correction).
        steps: u32,
    },
    RmsProp {
        mean_square: Vec<f64>,
    },
}

/// One Adam step. Updates the moment buffers in place and returns the
/// parameter delta `lr * m_hat / (sqrt(v_hat) + eps)`.
#[allow(clippy::too_many_arguments)]
pub fn adam_step(
    gradient: &[f64],
    first: &mut [f64],
    second: &mut [f64],
    steps: &mut u32,
    beta1: f64,
    beta2: f64,
    learning_rate: f64,
    epsilon: f64,
) -> Vec<f64> {
    *steps += 1;
    let t = *steps as i32;
    let c1 = 1.0 - beta1.powi(t);
    let c2 = 1.0 - beta2.powi(t);
    gradient
        .iter()
        .zip(first.iter_mut().zip(second.iter_mut()))
        .map(|(g, (m, v))| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            let m_hat = *m / c1;
            let v_hat = *v / c2;
            learning_rate * m_hat / (v_hat.sqrt() + epsilon)
        })
        .collect()
}

/// One RMSProp step. Updates the mean-square buffer in place and returns
/// `lr * g / (sqrt(ms) + eps)`.
pub fn rms_prop_step(
    gradient: &[f64],
    mean_square: &mut [f64],
    decay: f64,
    learning_rate: f64,
    epsilon: f64,
) -> Vec<f64> {
    gradient
        .iter()
        .zip(mean_square.iter_mut())
        .map(|(g, ms)| {
            *ms = decay * *ms + (1.0 - decay) * g * g;
            learning_rate * g / (ms.sqrt() + epsilon)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_prop_single_step() {
        let mut ms = vec![0.0];
        let delta = rms_prop_step(&[2.0], &mut ms, 0.5, 0.1, 1e-8);
        assert!((ms[0] - 2.0).abs() < 1e-12);
        let expected = 0.1 * 2.0 / (2.0f64.sqrt() + 1e-8);
        assert!((delta[0] - expected).abs() < 1e-12);
        assert!((delta[0] - 0.1 * 1.414_213_56).abs() < 1e-6);
    }

    #[test]
    fn test_adam_first_step_is_sign_times_lr() {
        // With bias correction the first step is lr * g / |g|.
        let mut m = vec![0.0, 0.0];
        let mut v = vec![0.0, 0.0];
        let mut steps = 0;
        let delta = adam_step(&[3.0, -0.5], &mut m, &mut v, &mut steps, 0.8, 0.8, 0.01, 1e-12);
        assert_eq!(steps, 1);
        assert!((delta[0] - 0.01).abs() < 1e-9);
        assert!((delta[1] + 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_adam_moments_accumulate() {
        let mut m = vec![0.0];
        let mut v = vec![0.0];
        let mut steps = 0;
        adam_step(&[1.0], &mut m, &mut v, &mut steps, 0.5, 0.5, 1.0, 1e-8);
        adam_step(&[1.0], &mut m, &mut v, &mut steps, 0.5, 0.5, 1.0, 1e-8);
        assert!((m[0] - 0.75).abs() < 1e-12);
        assert!((v[0] - 0.75).abs() < 1e-12);
        assert_eq!(steps, 2);
    }
}
