//! Flood classification stages
//!
//! - **multiscale**: tile-based bimodality mask selecting the thresholding population
//! - **threshold**: global Otsu / Kittler-Illingworth thresholding into a water seed
//! - **slope**: steep-terrain exclusion mask
//! - **water**: change-score statistics under a water mask
//! - **local**: adaptive local thresholding into a flood probability map
//! - **region_growing**: adaptive region growing of the seed

pub mod local;
pub mod multiscale;
pub mod region_growing;
pub mod slope;
pub mod threshold;
pub mod water;

pub use local::{
    evaluate_grid_point, grid_points, grid_spacing, refine as local_threshold, DecisionCounts,
    GridPoint, LocalThresholdConfig, ProbabilityMap, WindowBounds, WindowDecision, WindowVote,
};
pub use multiscale::{multiscale_bimodality_mask, BimodalityMask, MultiscaleParams};
pub use region_growing::{grow, grow_step, GrowthStep, RegionGrowingParams, RegionGrowingResult};
pub use slope::{steep_terrain_mask, SlopeMaskParams};
pub use threshold::{
    compute_threshold, global_threshold, kittler_illingworth_threshold, otsu_threshold,
    GlobalThreshold, GlobalThresholdParams, ThresholdMethod,
};
pub use water::{water_statistics, WaterStatistics};
