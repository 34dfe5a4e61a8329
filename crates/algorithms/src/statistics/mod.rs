//! Sample statistics used by the classification stages
//!
//! - **moments**: mean, standard deviation, bias-corrected skewness and kurtosis, quantiles
//! - **bimodality**: Sarle's bimodality coefficient of a (smoothed) score block
//! - **ks**: two-sample Kolmogorov-Smirnov test

pub mod bimodality;
pub mod ks;
pub mod moments;

pub use bimodality::{
    bimodality_coefficient, bimodality_coefficient_of, is_bimodal, BimodalityParams,
    UNIFORM_BIMODALITY,
};
pub use ks::{ks_two_sample, KsResult};
pub use moments::{
    mean_std, median, quantile, sample_excess_kurtosis, sample_skewness, Moments,
};

use ndarray::Array2;
use sarflood_core::Raster;

/// Copy of the raster data with every no-data cell replaced by NaN
pub fn nan_filled(raster: &Raster<f32>) -> Array2<f32> {
    raster
        .data()
        .mapv(|v| if raster.is_nodata(v) { f32::NAN } else { v })
}
