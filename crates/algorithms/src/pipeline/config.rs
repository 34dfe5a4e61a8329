//! Pipeline configuration
//!
//! Every section has defaults, so an empty TOML document is a valid
//! configuration. `FloodConfig::validate` runs before any raster is touched.

use serde::{Deserialize, Serialize};
use sarflood_core::{Error, Result};

use crate::classification::{
    grid_spacing, GlobalThresholdParams, LocalThresholdConfig, MultiscaleParams,
    RegionGrowingParams, SlopeMaskParams,
};
use crate::morphology::RefineParams;
use crate::statistics::UNIFORM_BIMODALITY;

/// Full flood mapping configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Minimum mapping unit, pixel area and connectivity
    pub mapping: RefineParams,
    pub change: ChangeConfig,
    pub bimodality: MultiscaleParams,
    pub thresholding: GlobalThresholdParams,
    pub slope: SlopeMaskParams,
    pub local: LocalConfig,
    pub region_growing: RegionGrowingConfig,
}

/// Change score post-processing
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeConfig {
    pub clip_low_quantile: f64,
    pub clip_high_quantile: f64,
}

impl Default for ChangeConfig {
    fn default() -> Self {
        Self {
            clip_low_quantile: 0.01,
            clip_high_quantile: 0.99,
        }
    }
}

/// Adaptive local thresholding
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub enabled: bool,
    pub p_value: f64,
    pub window_half_size_min: usize,
    pub window_half_size_max: usize,
    pub window_half_size_step: usize,
    pub bimodality_threshold: f64,
    pub flood_percentage_threshold: f64,
    pub probability_threshold: f64,
    pub separation_threshold: f64,
    /// Worker threads for grid-point evaluation; 0 = all cores
    pub workers: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            p_value: 0.05,
            window_half_size_min: 10,
            window_half_size_max: 50,
            window_half_size_step: 10,
            bimodality_threshold: UNIFORM_BIMODALITY,
            flood_percentage_threshold: 0.05,
            probability_threshold: 0.25,
            separation_threshold: 5.0,
            workers: 0,
        }
    }
}

/// Region growing
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionGrowingConfig {
    pub enabled: bool,
    /// Growth tolerance in multiples of the seed's water standard deviation
    pub tolerance_std: f64,
    pub max_iterations: usize,
    pub search_window: usize,
}

impl Default for RegionGrowingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_std: 1.0,
            max_iterations: 1000,
            search_window: 1,
        }
    }
}

impl FloodConfig {
    /// Reject invalid values in every section
    pub fn validate(&self) -> Result<()> {
        self.mapping.validate()?;
        crate::change::clip_quantile_bounds(self.change.clip_low_quantile, self.change.clip_high_quantile)?;
        self.bimodality.validate()?;
        self.thresholding.validate()?;
        self.slope.validate()?;
        self.local_threshold_config().validate()?;
        if !self.local.separation_threshold.is_finite() || self.local.separation_threshold < 0.0 {
            return Err(Error::InvalidParameter {
                name: "separation_threshold",
                value: self.local.separation_threshold.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        self.region_growing_params(1.0).validate()?;
        if !self.region_growing.tolerance_std.is_finite() || self.region_growing.tolerance_std < 0.0 {
            return Err(Error::InvalidParameter {
                name: "tolerance_std",
                value: self.region_growing.tolerance_std.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }

    /// Local thresholding settings, sharing the method, histogram and
    /// bimodality smoothing of the global stage
    pub fn local_threshold_config(&self) -> LocalThresholdConfig {
        LocalThresholdConfig {
            method: self.thresholding.method,
            bins: self.thresholding.bins,
            grid_spacing: grid_spacing(self.mapping.min_mapping_unit_m2, self.mapping.pixel_area_m2),
            p_value: self.local.p_value,
            window_half_size_min: self.local.window_half_size_min,
            window_half_size_max: self.local.window_half_size_max,
            window_half_size_step: self.local.window_half_size_step,
            bimodality_threshold: self.local.bimodality_threshold,
            flood_percentage_threshold: self.local.flood_percentage_threshold,
            probability_threshold: self.local.probability_threshold,
            separation_threshold: self.local.separation_threshold,
            bimodality: self.bimodality.bimodality,
        }
    }

    /// Region growing parameters for a seed whose water std is `water_std`
    pub fn region_growing_params(&self, water_std: f64) -> RegionGrowingParams {
        RegionGrowingParams {
            threshold: self.region_growing.tolerance_std * water_std,
            max_iterations: self.region_growing.max_iterations,
            search_window: self.region_growing.search_window,
        }
    }
}
