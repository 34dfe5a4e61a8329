//! Flood mapping pipeline
//!
//! Chains the stages from change scoring to morphological refinement and
//! writes the resulting products:
//!
//! 1. change score against the baseline, clipped to quantiles
//! 2. multi-scale bimodality mask
//! 3. optional steep-terrain exclusion
//! 4. global threshold and water seed
//! 5. optional adaptive local thresholding
//! 6. region growing
//! 7. morphological refinement to the minimum mapping unit

mod config;
mod run;
mod types;

pub use config::{ChangeConfig, FloodConfig, LocalConfig, RegionGrowingConfig};
pub use run::FloodPipeline;
pub use types::{
    GrowthSummary, LocalOutput, NoOpReporter, PipelineInputs, PipelineOutput, PipelineStage,
    ProgressReporter, BIMODALITY_MASK_FILE, CHANGE_SCORE_FILE, FLOOD_MASK_FILE,
    FLOOD_MASK_LOCAL_FILE, FLOOD_PROBABILITY_FILE,
};
