//! Adaptive local thresholding
//!
//! A lattice of grid points is laid over the water seed. Around each point
//! the most bimodal window (over a range of half sizes) is thresholded
//! locally; the local split is validated against the global water
//! statistics and the seed, and the point votes for its window's pixels.
//! Votes are reduced into a flood probability `occurrences / (visits + 1)`.

use ndarray::{s, Array2, ArrayView2};
use tracing::{debug, info};
use sarflood_core::{Error, Mask, Raster, Result};
use sarflood_parallel::{ParallelStrategy, ProcessingMode};

use super::threshold::{compute_threshold, ThresholdMethod};
use super::water::WaterStatistics;
use crate::statistics::{
    bimodality_coefficient, is_bimodal, ks_two_sample, mean_std, nan_filled, BimodalityParams,
    UNIFORM_BIMODALITY,
};

/// Configuration of the local thresholding stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalThresholdConfig {
    pub method: ThresholdMethod,
    pub bins: usize,
    /// Distance between grid points in pixels
    pub grid_spacing: usize,
    /// KS significance level; candidate and seed water are similar when p >= p_value
    pub p_value: f64,
    pub window_half_size_min: usize,
    pub window_half_size_max: usize,
    pub window_half_size_step: usize,
    pub bimodality_threshold: f64,
    /// Minimum seed fraction in a window for the local split to be accepted
    pub flood_percentage_threshold: f64,
    /// Probability at which the map is binarised
    pub probability_threshold: f64,
    pub separation_threshold: f64,
    pub bimodality: BimodalityParams,
}

impl Default for LocalThresholdConfig {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Otsu,
            bins: 256,
            grid_spacing: 3,
            p_value: 0.05,
            window_half_size_min: 10,
            window_half_size_max: 50,
            window_half_size_step: 10,
            bimodality_threshold: UNIFORM_BIMODALITY,
            flood_percentage_threshold: 0.05,
            probability_threshold: 0.25,
            separation_threshold: 5.0,
            bimodality: BimodalityParams::default(),
        }
    }
}

impl LocalThresholdConfig {
    /// Window half sizes searched at every grid point, ascending
    pub fn half_sizes(&self) -> Vec<usize> {
        (self.window_half_size_min..=self.window_half_size_max)
            .step_by(self.window_half_size_step.max(1))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_half_size_min == 0
            || self.window_half_size_step == 0
            || self.window_half_size_max < self.window_half_size_min
        {
            return Err(Error::InvalidParameter {
                name: "window_half_size",
                value: format!(
                    "{}..={} step {}",
                    self.window_half_size_min, self.window_half_size_max, self.window_half_size_step
                ),
                reason: "need 0 < min <= max and step > 0".to_string(),
            });
        }
        if self.grid_spacing == 0 {
            return Err(Error::InvalidParameter {
                name: "grid_spacing",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("p_value", self.p_value),
            ("flood_percentage_threshold", self.flood_percentage_threshold),
            ("probability_threshold", self.probability_threshold),
            ("bimodality_threshold", self.bimodality_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be within [0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Grid spacing in pixels for a minimum mapping unit: `round(sqrt(mmu / pixel_area))`, at least 1
pub fn grid_spacing(min_mapping_unit_m2: f64, pixel_area_m2: f64) -> usize {
    if pixel_area_m2 <= 0.0 || !min_mapping_unit_m2.is_finite() {
        return 1;
    }
    ((min_mapping_unit_m2 / pixel_area_m2).max(0.0).sqrt().round() as usize).max(1)
}

/// A lattice point at which a local window is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub row: usize,
    pub col: usize,
}

/// Lattice points with the given spacing that fall inside the seed.
///
/// The lattice is offset by half a spacing so points sit in cell centres of
/// a `spacing x spacing` partition.
pub fn grid_points(seed: &Mask, spacing: usize) -> Vec<GridPoint> {
    let spacing = spacing.max(1);
    let offset = spacing / 2;
    let (rows, cols) = seed.shape();
    let data = seed.data();

    (offset..rows)
        .step_by(spacing)
        .flat_map(|row| (offset..cols).step_by(spacing).map(move |col| GridPoint { row, col }))
        .filter(|p| data[(p.row, p.col)] != 0)
        .collect()
}

/// Window extent, clipped to the raster (end exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl WindowBounds {
    /// Square window of `half` pixels around `point`
    pub fn around(point: GridPoint, half: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_start: point.row.saturating_sub(half),
            row_end: (point.row + half + 1).min(rows),
            col_start: point.col.saturating_sub(half),
            col_end: (point.col + half + 1).min(cols),
        }
    }

    pub fn len(&self) -> usize {
        (self.row_end - self.row_start) * (self.col_end - self.col_start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn view<'a, T>(&self, data: ArrayView2<'a, T>) -> ArrayView2<'a, T> {
        data.slice_move(s![self.row_start..self.row_end, self.col_start..self.col_end])
    }
}

/// Outcome of one grid point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// No window was bimodal; the seed is kept
    Unimodal,
    /// Local split validated and adopted
    Accepted,
    /// Local water is brighter than global water; the window votes dry
    Zeroed,
    /// Local split not validated; the seed is kept
    Retained,
}

/// Vote of one grid point over its window
#[derive(Debug, Clone)]
pub struct WindowVote {
    pub point: GridPoint,
    pub bounds: WindowBounds,
    pub bimodality: Option<f64>,
    pub decision: WindowDecision,
    /// Water labels for the window cells
    pub local_mask: Array2<u8>,
}

/// Evaluate one grid point.
///
/// `score` must use NaN for no-data. Pure: reads only the inputs.
pub fn evaluate_grid_point(
    score: ArrayView2<'_, f32>,
    seed: ArrayView2<'_, u8>,
    point: GridPoint,
    water: &WaterStatistics,
    config: &LocalThresholdConfig,
) -> Result<WindowVote> {
    let (rows, cols) = score.dim();

    let mut best: Option<(f64, usize)> = None;
    for half in config.half_sizes() {
        let bounds = WindowBounds::around(point, half, rows, cols);
        if let Some(bc) = bimodality_coefficient(bounds.view(score), &config.bimodality)? {
            if best.map_or(true, |(b, _)| bc > b) {
                best = Some((bc, half));
            }
        }
    }

    let half = best.map_or(config.window_half_size_min, |(_, h)| h);
    let bounds = WindowBounds::around(point, half, rows, cols);
    let block = bounds.view(score);
    let seed_block = bounds.view(seed);
    let bimodality = best.map(|(bc, _)| bc);

    let vote = |decision, local_mask| WindowVote {
        point,
        bounds,
        bimodality,
        decision,
        local_mask,
    };

    if !is_bimodal(bimodality, config.bimodality_threshold) {
        return Ok(vote(WindowDecision::Unimodal, seed_block.to_owned()));
    }

    let values: Vec<f64> = block.iter().filter(|v| v.is_finite()).map(|&v| v as f64).collect();
    let threshold = match compute_threshold(&values, config.method, config.bins) {
        Some(t) => t,
        None => return Ok(vote(WindowDecision::Unimodal, seed_block.to_owned())),
    };

    let candidate_mask = block.mapv(|v| u8::from(v.is_finite() && (v as f64) < threshold));
    let candidate: Vec<f64> = values.iter().copied().filter(|&v| v < threshold).collect();
    let current: Vec<f64> = block
        .iter()
        .zip(seed_block.iter())
        .filter(|&(v, &m)| m != 0 && v.is_finite())
        .map(|(&v, _)| v as f64)
        .collect();

    let (cand_mean, cand_std) = match mean_std(&candidate, 0) {
        Some(ms) => ms,
        None => return Ok(vote(WindowDecision::Retained, seed_block.to_owned())),
    };

    let similar = ks_two_sample(&candidate, &current).is_some_and(|ks| ks.is_similar(config.p_value));
    let denom = water.std * water.std + cand_std * cand_std;
    let separation = if denom > 0.0 {
        (water.mean - cand_std).powi(2) / denom
    } else {
        0.0
    };
    let distinct = separation > config.separation_threshold;
    let darker = cand_mean < water.mean && distinct;
    let brighter = cand_mean > water.mean && distinct;

    let seed_fraction = seed_block.iter().filter(|&&m| m != 0).count() as f64 / bounds.len() as f64;

    if (similar || darker) && seed_fraction > config.flood_percentage_threshold {
        Ok(vote(WindowDecision::Accepted, candidate_mask))
    } else if brighter {
        Ok(vote(WindowDecision::Zeroed, Array2::zeros(block.dim())))
    } else {
        Ok(vote(WindowDecision::Retained, seed_block.to_owned()))
    }
}

/// Tally of grid-point decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub unimodal: usize,
    pub accepted: usize,
    pub zeroed: usize,
    pub retained: usize,
}

impl DecisionCounts {
    fn record(&mut self, decision: WindowDecision) {
        match decision {
            WindowDecision::Unimodal => self.unimodal += 1,
            WindowDecision::Accepted => self.accepted += 1,
            WindowDecision::Zeroed => self.zeroed += 1,
            WindowDecision::Retained => self.retained += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unimodal + self.accepted + self.zeroed + self.retained
    }
}

/// Flood probability from overlapping window votes
#[derive(Debug, Clone)]
pub struct ProbabilityMap {
    /// `occurrences / (visits + 1)`; 0 where unvisited, NaN where the score is no-data
    pub probability: Raster<f32>,
    pub occurrences: Array2<u32>,
    pub visits: Array2<u32>,
    pub decisions: DecisionCounts,
}

impl ProbabilityMap {
    /// Pixels with probability at or above `threshold`
    pub fn binarize(&self, threshold: f64) -> Mask {
        let t = threshold as f32;
        self.probability.mask_where(|p| p >= t)
    }
}

/// Run local thresholding over all grid points of `seed`.
///
/// Grid points are evaluated independently (in parallel per `mode`) and
/// reduced in grid order, so the result does not depend on scheduling.
pub fn refine(
    score: &Raster<f32>,
    seed: &Mask,
    water: &WaterStatistics,
    config: &LocalThresholdConfig,
    mode: ProcessingMode,
) -> Result<ProbabilityMap> {
    config.validate()?;
    score.ensure_same_shape(seed)?;

    let data = nan_filled(score);
    let points = grid_points(seed, config.grid_spacing);
    debug!(grid_points = points.len(), spacing = config.grid_spacing, "local thresholding grid");

    let votes = mode.par_map(points, |point| {
        evaluate_grid_point(data.view(), seed.view(), point, water, config)
    })?;

    let (rows, cols) = score.shape();
    let mut occurrences = Array2::<u32>::zeros((rows, cols));
    let mut visits = Array2::<u32>::zeros((rows, cols));
    let mut decisions = DecisionCounts::default();

    for vote in votes {
        let vote = vote?;
        decisions.record(vote.decision);
        let b = vote.bounds;
        visits
            .slice_mut(s![b.row_start..b.row_end, b.col_start..b.col_end])
            .mapv_inplace(|v| v + 1);
        let mut occ = occurrences.slice_mut(s![b.row_start..b.row_end, b.col_start..b.col_end]);
        occ.zip_mut_with(&vote.local_mask, |o, &m| *o += u32::from(m != 0));
    }

    let probability = Array2::from_shape_fn((rows, cols), |(r, c)| {
        if data[(r, c)].is_finite() {
            occurrences[(r, c)] as f32 / (visits[(r, c)] + 1) as f32
        } else {
            f32::NAN
        }
    });

    info!(
        grid_points = decisions.total(),
        accepted = decisions.accepted,
        zeroed = decisions.zeroed,
        retained = decisions.retained,
        unimodal = decisions.unimodal,
        "local thresholding"
    );

    Ok(ProbabilityMap {
        probability: score.derive(probability, Some(f32::NAN))?,
        occurrences,
        visits,
        decisions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::Lcg;
    use sarflood_core::GeoTransform;

    const RAW: BimodalityParams = BimodalityParams {
        smoothing_sigma: None,
        min_samples: 100,
    };

    /// Water (-10 dB-ish) left of `edge`, land (+5) right of it
    fn split_scene(rows: usize, cols: usize, edge: usize) -> Raster<f32> {
        let mut rng = Lcg::new(23);
        let mut r = Raster::filled(rows, cols, 0.0_f32);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(f32::NAN));
        for ((_, c), v) in r.data_mut().indexed_iter_mut() {
            let base = if c < edge { -10.0 } else { 5.0 };
            *v = base + 0.5 * rng.next_normal() as f32;
        }
        r
    }

    fn seed_cols(rows: usize, cols: usize, range: std::ops::Range<usize>) -> Mask {
        let mut m = Mask::new(rows, cols);
        for ((_, c), v) in m.data_mut().indexed_iter_mut() {
            *v = u8::from(range.contains(&c));
        }
        m
    }

    fn config(half: usize, spacing: usize) -> LocalThresholdConfig {
        LocalThresholdConfig {
            grid_spacing: spacing,
            window_half_size_min: half,
            window_half_size_max: half,
            window_half_size_step: 1,
            bimodality: RAW,
            ..Default::default()
        }
    }

    #[test]
    fn test_grid_spacing() {
        assert_eq!(grid_spacing(1000.0, 100.0), 3);
        assert_eq!(grid_spacing(100.0, 1.0), 10);
        assert_eq!(grid_spacing(0.0, 100.0), 1);
        assert_eq!(grid_spacing(1000.0, 0.0), 1);
    }

    #[test]
    fn test_grid_points_inside_seed() {
        let seed = seed_cols(20, 20, 10..20);
        let points = grid_points(&seed, 5);
        assert!(!points.is_empty());
        for p in &points {
            assert!(seed.is_set(p.row, p.col));
            assert_eq!(p.row % 5, 2);
            assert_eq!(p.col % 5, 2);
        }
        assert_eq!(points.len(), 4 * 2);
    }

    #[test]
    fn test_window_bounds_clipped() {
        let b = WindowBounds::around(GridPoint { row: 1, col: 18 }, 3, 20, 20);
        assert_eq!((b.row_start, b.row_end, b.col_start, b.col_end), (0, 5, 15, 20));
        assert_eq!(b.len(), 25);
    }

    #[test]
    fn test_unimodal_windows_keep_seed() {
        let mut rng = Lcg::new(5);
        let mut score = Raster::filled(60, 60, 0.0_f32);
        for v in score.data_mut().iter_mut() {
            *v = -8.0 + rng.next_normal() as f32;
        }
        let seed = {
            let mut m = Mask::new(60, 60);
            for ((r, c), v) in m.data_mut().indexed_iter_mut() {
                *v = u8::from((20..40).contains(&r) && (20..40).contains(&c));
            }
            m
        };
        let water = WaterStatistics { mean: -8.0, std: 1.0, count: 400 };
        let cfg = LocalThresholdConfig {
            bimodality_threshold: 1.0,
            ..config(5, 5)
        };

        let map = refine(&score, &seed, &water, &cfg, ProcessingMode::Sequential).unwrap();
        assert_eq!(map.decisions.unimodal, map.decisions.total());
        assert_eq!(map.binarize(cfg.probability_threshold).data(), seed.data());
        for &p in map.probability.data().iter() {
            assert!((0.0..1.0).contains(&p));
        }
    }

    #[test]
    fn test_local_split_extends_under_segmented_seed() {
        let score = split_scene(60, 60, 30);
        let seed = seed_cols(60, 60, 20..30);
        let water = WaterStatistics { mean: -9.0, std: 1.0, count: 600 };
        let cfg = config(10, 5);

        let map = refine(&score, &seed, &water, &cfg, ProcessingMode::Sequential).unwrap();
        assert!(map.decisions.accepted > 0);
        let mask = map.binarize(cfg.probability_threshold);
        assert!(mask.is_set(30, 14), "unseeded water next to the seed should be added");
        assert!(mask.is_set(30, 25), "seed water should stay");
        assert!(!mask.is_set(30, 31), "land must not be added");
        assert_eq!(map.visits[(30, 0)], 0);
        assert_eq!(map.probability.get(30, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_brighter_local_water_votes_dry() {
        let score = split_scene(40, 40, 20);
        let data = nan_filled(&score);
        let seed = seed_cols(40, 40, 20..25);
        let water = WaterStatistics { mean: -20.0, std: 1.0, count: 100 };

        let vote = evaluate_grid_point(
            data.view(),
            seed.view(),
            GridPoint { row: 20, col: 22 },
            &water,
            &config(10, 5),
        )
        .unwrap();
        assert_eq!(vote.decision, WindowDecision::Zeroed);
        assert!(vote.local_mask.iter().all(|&m| m == 0));
    }

    /// Noise-free window: water at -20 left of column 15, land at +5, seed on
    /// land columns 20..26 so the candidate and seed water differ under KS
    fn separation_vote(water: WaterStatistics) -> WindowVote {
        let mut score = Raster::filled(30, 30, 5.0_f32);
        for ((_, c), v) in score.data_mut().indexed_iter_mut() {
            if c < 15 {
                *v = -20.0;
            }
        }
        let data = nan_filled(&score);
        let seed = seed_cols(30, 30, 20..26);
        evaluate_grid_point(
            data.view(),
            seed.view(),
            GridPoint { row: 15, col: 15 },
            &water,
            &config(10, 5),
        )
        .unwrap()
    }

    #[test]
    fn test_significantly_darker_candidate_accepted() {
        // candidate std is 0: separation = (-3 - 0)^2 / (1 + 0) = 9 > 5
        let vote = separation_vote(WaterStatistics { mean: -3.0, std: 1.0, count: 100 });
        assert_eq!(vote.decision, WindowDecision::Accepted);
        // local mask holds the candidate water, not the seed
        assert_eq!(vote.local_mask[(10, 0)], 1);
        assert_eq!(vote.local_mask[(10, 18)], 0);
    }

    #[test]
    fn test_weak_separation_retains_seed() {
        // separation = (-2 - 0)^2 / 1 = 4 <= 5, although the means differ by 18
        let vote = separation_vote(WaterStatistics { mean: -2.0, std: 1.0, count: 100 });
        assert_eq!(vote.decision, WindowDecision::Retained);
        assert_eq!(vote.local_mask[(10, 0)], 0);
        assert_eq!(vote.local_mask[(10, 18)], 1);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let score = split_scene(50, 50, 25);
        let seed = seed_cols(50, 50, 15..25);
        let water = WaterStatistics { mean: -9.5, std: 1.0, count: 500 };
        let cfg = config(8, 4);

        let seq = refine(&score, &seed, &water, &cfg, ProcessingMode::Sequential).unwrap();
        let par = refine(&score, &seed, &water, &cfg, ProcessingMode::ParallelWith(4)).unwrap();
        assert_eq!(seq.occurrences, par.occurrences);
        assert_eq!(seq.visits, par.visits);
        assert_eq!(seq.decisions, par.decisions);
    }

    #[test]
    fn test_invalid_config() {
        let score = split_scene(10, 10, 5);
        let seed = seed_cols(10, 10, 0..5);
        let water = WaterStatistics { mean: -10.0, std: 1.0, count: 50 };
        let cfg = LocalThresholdConfig {
            window_half_size_step: 0,
            ..Default::default()
        };
        assert!(refine(&score, &seed, &water, &cfg, ProcessingMode::Sequential).is_err());
    }
}
