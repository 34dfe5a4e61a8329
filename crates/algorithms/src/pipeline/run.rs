use std::time::Instant;

use sarflood_core::{Mask, Raster, Result};
use sarflood_parallel::ProcessingMode;
use tracing::{info, warn};

use super::config::FloodConfig;
use super::types::{
    GrowthSummary, LocalOutput, NoOpReporter, PipelineInputs, PipelineOutput, PipelineStage,
    ProgressReporter,
};
use crate::change::{change_score, clip_to_quantiles};
use crate::classification::{
    global_threshold, grow, local_threshold, multiscale_bimodality_mask, steep_terrain_mask,
    water_statistics, WaterStatistics,
};
use crate::morphology::refine_mask;

/// End-to-end flood mapping from a baseline stack and a flood acquisition
#[derive(Debug, Clone)]
pub struct FloodPipeline {
    config: FloodConfig,
    mode: ProcessingMode,
}

impl FloodPipeline {
    /// Create a pipeline. The configuration is validated here, before any
    /// raster is read.
    pub fn new(config: FloodConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mode: ProcessingMode::default(),
        })
    }

    /// Processing mode for the tile-based bimodality stage
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &FloodConfig {
        &self.config
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn run(&self, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        self.run_reported(inputs, &NoOpReporter)
    }

    /// Run every stage, reporting progress to `reporter`.
    ///
    /// Fatal errors are wrapped in `Error::Stage` with the failing stage's
    /// name. An empty water seed is not fatal: it yields an empty flood mask.
    pub fn run_reported(
        &self,
        inputs: &PipelineInputs,
        reporter: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        let started = Instant::now();
        let config = &self.config;

        let (change, score) = stage(reporter, PipelineStage::ChangeScore, || {
            let change = change_score(&inputs.baseline, &inputs.flood, inputs.incidence.as_ref())?;
            let score = clip_to_quantiles(
                &change.score,
                config.change.clip_low_quantile,
                config.change.clip_high_quantile,
            )?;
            Ok((change, score))
        })?;
        info!(
            rows = score.rows(),
            cols = score.cols(),
            baseline = inputs.baseline.len(),
            valid = score.valid_count(),
            "change score"
        );

        let bimodality = stage(reporter, PipelineStage::Bimodality, || {
            multiscale_bimodality_mask(&score, &config.bimodality, self.mode)
        })?;

        let steep_terrain = match &inputs.slope {
            Some(slope) => Some(stage(reporter, PipelineStage::SlopeMask, || {
                score.ensure_same_shape(slope)?;
                steep_terrain_mask(slope, &config.slope)
            })?),
            None => None,
        };

        let global = stage(reporter, PipelineStage::GlobalThreshold, || {
            global_threshold(&score, &bimodality.mask, steep_terrain.as_ref(), &config.thresholding)
        })?;
        let water = water_statistics(&score, &global.seed)?;

        let (region_growing, flood_mask) = match &water {
            Some(stats) => self.grow_and_refine(&score, &global.seed, stats, reporter)?,
            None => {
                warn!("water seed is empty; flood mask will be empty");
                (None, empty_mask(&score))
            }
        };

        let local = match (&water, config.local.enabled) {
            (Some(stats), true) => Some(self.run_local(&score, &global.seed, stats, reporter)?),
            _ => None,
        };

        info!(
            flooded = flood_mask.count_set(),
            threshold = ?global.threshold,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "flood mapping finished"
        );

        Ok(PipelineOutput {
            change,
            score,
            bimodality,
            steep_terrain,
            threshold: global.threshold,
            seed: global.seed,
            water,
            region_growing,
            flood_mask,
            local,
        })
    }

    /// Local thresholding, then growing and refinement of its binarized map
    fn run_local(
        &self,
        score: &Raster<f32>,
        seed: &Mask,
        water: &WaterStatistics,
        reporter: &dyn ProgressReporter,
    ) -> Result<LocalOutput> {
        let local_config = self.config.local_threshold_config();
        let mode = ProcessingMode::from_workers(self.config.local.workers);

        let probability = stage(reporter, PipelineStage::LocalThreshold, || {
            local_threshold(score, seed, water, &local_config, mode)
        })?;
        let local_seed = probability.binarize(self.config.local.probability_threshold);

        let (region_growing, flood_mask) = match water_statistics(score, &local_seed)? {
            Some(stats) => self.grow_and_refine(score, &local_seed, &stats, reporter)?,
            None => {
                warn!("local thresholding left no water; local flood mask will be empty");
                (None, empty_mask(score))
            }
        };

        Ok(LocalOutput {
            probability,
            seed: local_seed,
            region_growing,
            flood_mask,
        })
    }

    fn grow_and_refine(
        &self,
        score: &Raster<f32>,
        seed: &Mask,
        water: &WaterStatistics,
        reporter: &dyn ProgressReporter,
    ) -> Result<(Option<GrowthSummary>, Mask)> {
        let (summary, grown) = if self.config.region_growing.enabled {
            let params = self.config.region_growing_params(water.std);
            let result = stage(reporter, PipelineStage::RegionGrowing, || grow(score, seed, &params))?;
            let summary = GrowthSummary {
                iterations: result.iterations,
                converged: result.converged,
                grown: result.grown,
                threshold: params.threshold,
            };
            (Some(summary), result.mask)
        } else {
            (None, seed.clone())
        };

        let mut refined = stage(reporter, PipelineStage::Refinement, || {
            refine_mask(&grown, &self.config.mapping)
        })?;
        // hole filling may reach into no-data
        for (m, &v) in refined.data_mut().iter_mut().zip(score.data().iter()) {
            if score.is_nodata(v) {
                *m = 0;
            }
        }
        Ok((summary, refined))
    }
}

fn stage<T>(
    reporter: &dyn ProgressReporter,
    stage: PipelineStage,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    reporter.begin_stage(stage);
    let result = f().map_err(|e| e.in_stage(stage.name()));
    reporter.finish_stage();
    result
}

fn empty_mask(score: &Raster<f32>) -> Mask {
    score.mask_where(|_| false)
}
