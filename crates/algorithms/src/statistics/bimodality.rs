//! Sarle's bimodality coefficient
//!
//! `BC = (G1^2 + 1) / (G2 + 3 (n-1)^2 / ((n-2)(n-3)))` with bias-corrected
//! skewness G1 and excess kurtosis G2. A uniform distribution scores 5/9;
//! values above that suggest two modes.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use sarflood_core::Result;

use crate::filters::gaussian_blur;
use super::moments::Moments;

/// Bimodality coefficient of a uniform distribution
pub const UNIFORM_BIMODALITY: f64 = 5.0 / 9.0;

/// Parameters for block bimodality evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BimodalityParams {
    /// Gaussian pre-smoothing in cells; `None` disables smoothing
    pub smoothing_sigma: Option<f64>,
    /// Minimum number of valid cells for a defined coefficient
    pub min_samples: usize,
}

impl Default for BimodalityParams {
    fn default() -> Self {
        Self {
            smoothing_sigma: Some(5.0),
            min_samples: 100,
        }
    }
}

/// Bimodality coefficient of a sample, clamped to [0, 1].
///
/// `None` when fewer than four values are given or the sample is constant.
pub fn bimodality_coefficient_of(values: &[f64]) -> Option<f64> {
    let moments = Moments::of(values)?;
    let g1 = moments.skewness()?;
    let g2 = moments.excess_kurtosis()?;
    let n = moments.n as f64;
    let denom = g2 + 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    if denom <= 0.0 || !denom.is_finite() {
        return None;
    }
    Some(((g1 * g1 + 1.0) / denom).clamp(0.0, 1.0))
}

/// Bimodality coefficient of a score block.
///
/// Non-finite cells are no-data. The block is smoothed first when
/// `params.smoothing_sigma` is set. Blocks with fewer than
/// `params.min_samples` valid cells yield `None`.
pub fn bimodality_coefficient(
    block: ArrayView2<'_, f32>,
    params: &BimodalityParams,
) -> Result<Option<f64>> {
    let valid = block.iter().filter(|v| v.is_finite()).count();
    if valid < params.min_samples.max(4) {
        return Ok(None);
    }

    let values: Vec<f64> = match params.smoothing_sigma {
        Some(sigma) if sigma > 0.0 => gaussian_blur(block, sigma)?
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| v as f64)
            .collect(),
        _ => block
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| v as f64)
            .collect(),
    };

    Ok(bimodality_coefficient_of(&values))
}

/// Whether a coefficient counts as bimodal (strictly above `threshold`)
pub fn is_bimodal(coefficient: Option<f64>, threshold: f64) -> bool {
    coefficient.is_some_and(|bc| bc > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::Lcg;
    use ndarray::Array2;

    const RAW: BimodalityParams = BimodalityParams {
        smoothing_sigma: None,
        min_samples: 100,
    };

    #[test]
    fn test_two_point_distribution_near_one() {
        let values: Vec<f64> = (0..10_000).map(|i| (i % 2) as f64).collect();
        let bc = bimodality_coefficient_of(&values).unwrap();
        assert!((bc - 1.0).abs() < 0.01, "Two-point BC should be ~1, got {}", bc);
    }

    #[test]
    fn test_uniform_distribution_near_five_ninths() {
        let values: Vec<f64> = (0..10_000).map(|i| i as f64 / 9_999.0).collect();
        let bc = bimodality_coefficient_of(&values).unwrap();
        assert!(
            (bc - UNIFORM_BIMODALITY).abs() < 0.01,
            "Uniform BC should be ~0.555, got {}",
            bc
        );
    }

    #[test]
    fn test_normal_distribution_unimodal() {
        let mut rng = Lcg::new(7);
        let values: Vec<f64> = (0..10_000).map(|_| rng.next_normal()).collect();
        let bc = bimodality_coefficient_of(&values).unwrap();
        assert!((bc - 1.0 / 3.0).abs() < 0.05, "Normal BC should be ~1/3, got {}", bc);
        assert!(!is_bimodal(Some(bc), UNIFORM_BIMODALITY));
    }

    #[test]
    fn test_block_below_min_samples() {
        let mut block = Array2::from_elem((10, 10), 1.0_f32);
        block[(0, 0)] = f32::NAN;
        block[(5, 5)] = -3.0;
        let bc = bimodality_coefficient(block.view(), &RAW).unwrap();
        assert!(bc.is_none(), "99 valid cells is below the 100 minimum");
    }

    #[test]
    fn test_constant_block_undefined() {
        let block = Array2::from_elem((20, 20), -4.0_f32);
        assert!(bimodality_coefficient(block.view(), &RAW).unwrap().is_none());
        assert!(!is_bimodal(None, 0.0));
    }

    #[test]
    fn test_smoothed_step_block_stays_bimodal() {
        let block = Array2::from_shape_fn((40, 40), |(_, c)| if c < 20 { -10.0_f32 } else { 5.0 });
        let params = BimodalityParams {
            smoothing_sigma: Some(1.0),
            min_samples: 100,
        };
        let bc = bimodality_coefficient(block.view(), &params).unwrap().unwrap();
        assert!(bc > UNIFORM_BIMODALITY, "Step edge should stay bimodal, got {}", bc);
    }
}
