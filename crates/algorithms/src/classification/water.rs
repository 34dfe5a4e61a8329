//! Change-score statistics of the pixels currently labelled water

use ndarray::ArrayView2;
use sarflood_core::{Mask, Raster, Result};

/// Mean and population standard deviation of the score under a water mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterStatistics {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// Water statistics of `score` under `mask`. `None` when no valid pixel is set.
pub fn water_statistics(score: &Raster<f32>, mask: &Mask) -> Result<Option<WaterStatistics>> {
    score.ensure_same_shape(mask)?;
    let data = crate::statistics::nan_filled(score);
    Ok(water_statistics_of(data.view(), mask.view()))
}

/// Water statistics over plain arrays; non-finite scores are no-data
pub(crate) fn water_statistics_of(
    score: ArrayView2<'_, f32>,
    mask: ArrayView2<'_, u8>,
) -> Option<WaterStatistics> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for (&v, &m) in score.iter().zip(mask.iter()) {
        if m != 0 && v.is_finite() {
            let v = v as f64;
            count += 1;
            sum += v;
            sum_sq += v * v;
        }
    }
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let var = (sum_sq / count as f64 - mean * mean).max(0.0);
    Some(WaterStatistics {
        mean,
        std: var.sqrt(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_statistics_under_mask() {
        let mut score = Raster::from_vec(vec![-20.0_f32, -22.0, -24.0, 5.0, f32::NAN, 3.0], 2, 3).unwrap();
        score.set_nodata(Some(f32::NAN));
        let mask = Mask::from_vec(vec![1, 1, 1, 0, 1, 0], 2, 3).unwrap();

        let stats = water_statistics(&score, &mask).unwrap().unwrap();
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, -22.0, epsilon = 1e-9);
        assert_relative_eq!(stats.std, (8.0_f64 / 3.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_empty_mask_is_undefined() {
        let score = Raster::filled(3, 3, -10.0_f32);
        let mask = Mask::new(3, 3);
        assert!(water_statistics(&score, &mask).unwrap().is_none());
        assert!(water_statistics(&score, &Mask::new(2, 3)).is_err());
    }
}
