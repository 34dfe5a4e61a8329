//! # SARFlood Algorithms
//!
//! Flood mapping from a stack of pre-event SAR acquisitions and one
//! acquisition during the flood.
//!
//! ## Modules
//!
//! - **change**: baseline stacks and the per-pixel change score (t-statistic)
//! - **statistics**: moments, bimodality coefficient, two-sample KS test
//! - **filters**: NaN-aware Gaussian smoothing
//! - **classification**: bimodality masking, global and local thresholding, region growing
//! - **morphology**: dilation, connected components, mapping-unit refinement
//! - **pipeline**: stage orchestration and TOML configuration
//! - **synthetic**: seeded synthetic flood scenes for tests and benchmarks

pub mod change;
pub mod classification;
pub mod filters;
pub mod morphology;
pub mod pipeline;
pub mod statistics;
pub mod synthetic;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{change_score, clip_to_quantiles, BaselineStack, ChangeScore};
    pub use crate::classification::{
        global_threshold, grow, local_threshold, multiscale_bimodality_mask, steep_terrain_mask,
        water_statistics, GlobalThresholdParams, LocalThresholdConfig, MultiscaleParams,
        RegionGrowingParams, SlopeMaskParams, ThresholdMethod, WaterStatistics,
    };
    pub use crate::filters::gaussian_smoothing;
    pub use crate::morphology::{dilate, label_components, refine_mask, RefineParams, StructuringElement};
    pub use crate::pipeline::{
        FloodConfig, FloodPipeline, NoOpReporter, PipelineInputs, PipelineOutput, PipelineStage,
        ProgressReporter,
    };
    pub use crate::statistics::{bimodality_coefficient, ks_two_sample, BimodalityParams};
    pub use sarflood_parallel::ProcessingMode;
    pub use sarflood_core::prelude::*;
}
