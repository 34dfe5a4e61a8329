use std::fmt;
use std::path::{Path, PathBuf};

use sarflood_core::io::{write_geotiff, write_mask_geotiff};
use sarflood_core::{Mask, Raster, Result};

use crate::change::{BaselineStack, ChangeScore};
use crate::classification::{BimodalityMask, ProbabilityMap, WaterStatistics};

/// Pipeline stage, used for progress reporting and error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    ChangeScore,
    Bimodality,
    SlopeMask,
    GlobalThreshold,
    LocalThreshold,
    RegionGrowing,
    Refinement,
    Writing,
}

impl PipelineStage {
    /// Short machine-friendly name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChangeScore => "change_score",
            Self::Bimodality => "bimodality",
            Self::SlopeMask => "slope_mask",
            Self::GlobalThreshold => "global_threshold",
            Self::LocalThreshold => "local_threshold",
            Self::RegionGrowing => "region_growing",
            Self::Refinement => "refinement",
            Self::Writing => "writing",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChangeScore => write!(f, "Computing change score"),
            Self::Bimodality => write!(f, "Selecting bimodal tiles"),
            Self::SlopeMask => write!(f, "Masking steep terrain"),
            Self::GlobalThreshold => write!(f, "Thresholding"),
            Self::LocalThreshold => write!(f, "Local thresholding"),
            Self::RegionGrowing => write!(f, "Growing regions"),
            Self::Refinement => write!(f, "Refining masks"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Progress reporting for the pipeline. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started
    fn begin_stage(&self, _stage: PipelineStage) {}

    /// The current stage is finished
    fn finish_stage(&self) {}
}

/// Reporter that ignores every event
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Rasters consumed by one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub baseline: BaselineStack,
    pub flood: Raster<f32>,
    /// Local incidence angle in degrees
    pub incidence: Option<Raster<f32>>,
    /// Terrain slope in degrees
    pub slope: Option<Raster<f32>>,
}

/// Summary of a region growing run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthSummary {
    pub iterations: usize,
    pub converged: bool,
    pub grown: usize,
    /// Tolerance used, in change-score units
    pub threshold: f64,
}

/// Products of the locally adaptive variant
#[derive(Debug, Clone)]
pub struct LocalOutput {
    pub probability: ProbabilityMap,
    pub seed: Mask,
    pub region_growing: Option<GrowthSummary>,
    pub flood_mask: Mask,
}

/// Everything a pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Raw change score and baseline statistics
    pub change: ChangeScore,
    /// Quantile-clipped score used by the classification stages
    pub score: Raster<f32>,
    pub bimodality: BimodalityMask,
    pub steep_terrain: Option<Mask>,
    pub threshold: Option<f64>,
    pub seed: Mask,
    pub water: Option<WaterStatistics>,
    pub region_growing: Option<GrowthSummary>,
    pub flood_mask: Mask,
    pub local: Option<LocalOutput>,
}

/// File names used by [`PipelineOutput::write_all`]
pub const CHANGE_SCORE_FILE: &str = "change_score.tif";
pub const BIMODALITY_MASK_FILE: &str = "bimodality_mask.tif";
pub const FLOOD_MASK_FILE: &str = "flood_mask.tif";
pub const FLOOD_PROBABILITY_FILE: &str = "flood_probability.tif";
pub const FLOOD_MASK_LOCAL_FILE: &str = "flood_mask_local.tif";

impl PipelineOutput {
    /// Write the products as GeoTIFFs into `dir` and return the written paths
    pub fn write_all(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let path = dir.join(CHANGE_SCORE_FILE);
        write_geotiff(&self.change.score, &path, None)?;
        written.push(path);

        let path = dir.join(BIMODALITY_MASK_FILE);
        write_mask_geotiff(&self.bimodality.mask, &path)?;
        written.push(path);

        let path = dir.join(FLOOD_MASK_FILE);
        write_mask_geotiff(&self.flood_mask, &path)?;
        written.push(path);

        if let Some(local) = &self.local {
            let path = dir.join(FLOOD_PROBABILITY_FILE);
            write_geotiff(&local.probability.probability, &path, None)?;
            written.push(path);

            let path = dir.join(FLOOD_MASK_LOCAL_FILE);
            write_mask_geotiff(&local.flood_mask, &path)?;
            written.push(path);
        }

        Ok(written)
    }

    /// Flooded area in square metres, from the raster's own pixel size
    pub fn flooded_area_m2(&self) -> f64 {
        self.flood_mask.count_set() as f64 * self.flood_mask.pixel_area()
    }
}
