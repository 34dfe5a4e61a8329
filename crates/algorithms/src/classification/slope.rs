//! Steep-terrain exclusion mask
//!
//! Radar shadow and layover on steep slopes look like open water. The slope
//! raster is widened with a maximum filter, smoothed, and thresholded.

use serde::{Deserialize, Serialize};
use tracing::debug;
use sarflood_core::{Error, Mask, Raster, Result};

use crate::filters::gaussian_smoothing;
use crate::morphology::{dilate, StructuringElement};

/// Parameters for the steep-terrain mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeMaskParams {
    /// Slopes above this (degrees) are excluded
    pub max_slope_degrees: f64,
    /// Radius of the square maximum filter; 0 disables it
    pub max_filter_radius: usize,
    /// Gaussian smoothing after the maximum filter; 0 disables it
    pub smoothing_sigma: f64,
}

impl Default for SlopeMaskParams {
    fn default() -> Self {
        Self {
            max_slope_degrees: 12.0,
            max_filter_radius: 2,
            smoothing_sigma: 2.0,
        }
    }
}

impl SlopeMaskParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=90.0).contains(&self.max_slope_degrees) {
            return Err(Error::InvalidParameter {
                name: "max_slope_degrees",
                value: self.max_slope_degrees.to_string(),
                reason: "must be within [0, 90]".to_string(),
            });
        }
        if !self.smoothing_sigma.is_finite() || self.smoothing_sigma < 0.0 {
            return Err(Error::InvalidParameter {
                name: "smoothing_sigma",
                value: self.smoothing_sigma.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

/// Mask of pixels on steep terrain. No-data slope is never excluded.
pub fn steep_terrain_mask(slope: &Raster<f32>, params: &SlopeMaskParams) -> Result<Mask> {
    params.validate()?;

    let widened = if params.max_filter_radius > 0 {
        dilate(slope, &StructuringElement::Square(params.max_filter_radius))?
    } else {
        slope.clone()
    };
    let smoothed = gaussian_smoothing(&widened, params.smoothing_sigma)?;

    let limit = params.max_slope_degrees as f32;
    let mask = smoothed.mask_where(|v| v > limit);
    debug!(steep_pixels = mask.count_set(), "steep terrain mask");
    Ok(mask)
}
