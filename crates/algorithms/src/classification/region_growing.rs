//! Adaptive region growing of the water seed
//!
//! Each iteration recomputes the water statistics from the current mask and
//! examines a window around every frontier pixel. The window's median, taken
//! against the upper water bound `mean + 2 std`, sets a growth factor
//!
//! `f = clamp((mean + 2 std - median) / (2 std), 0, 1)`
//!
//! Windows that look like land (`f = 0`) do not grow. Otherwise valid window
//! pixels darker than the window mean by more than `threshold * f` join the
//! mask. Reads use
//! the mask of the previous iteration and writes go to a fresh buffer, so
//! the outcome does not depend on visiting order.

use ndarray::{s, Array2, ArrayView2};
use crate::maybe_rayon::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use sarflood_core::{Error, Mask, Raster, Result};

use super::water::{water_statistics_of, WaterStatistics};
use crate::statistics::{median, nan_filled};

/// Region growing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionGrowingParams {
    /// Tolerance in change-score units
    pub threshold: f64,
    pub max_iterations: usize,
    /// Half size of the window around each frontier pixel
    pub search_window: usize,
}

impl Default for RegionGrowingParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            max_iterations: 1000,
            search_window: 1,
        }
    }
}

impl RegionGrowingParams {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: self.threshold.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        if self.search_window == 0 {
            return Err(Error::InvalidParameter {
                name: "search_window",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// One growth iteration
#[derive(Debug, Clone)]
pub struct GrowthStep {
    /// Mask after the iteration (superset of the input mask)
    pub mask: Array2<u8>,
    /// Pixels added in this iteration
    pub frontier: Vec<(usize, usize)>,
    /// Water statistics the iteration used
    pub water: WaterStatistics,
}

/// Run one growth iteration from `current` around `frontier`.
///
/// `score` must use NaN for no-data. `None` when the current mask holds no
/// valid water pixel.
pub fn grow_step(
    score: ArrayView2<'_, f32>,
    current: ArrayView2<'_, u8>,
    frontier: &[(usize, usize)],
    params: &RegionGrowingParams,
) -> Option<GrowthStep> {
    let water = water_statistics_of(score, current)?;
    let (rows, cols) = score.dim();
    let w = params.search_window;
    let upper = water.mean + 2.0 * water.std;

    let additions: Vec<(usize, usize)> = frontier
        .into_par_iter()
        .flat_map(|&(row, col)| {
            let r0 = row.saturating_sub(w);
            let r1 = (row + w + 1).min(rows);
            let c0 = col.saturating_sub(w);
            let c1 = (col + w + 1).min(cols);
            if r1 - r0 < 2 || c1 - c0 < 2 {
                return Vec::new();
            }

            let window = score.slice(s![r0..r1, c0..c1]);
            let mut values: Vec<f64> = window.iter().filter(|v| v.is_finite()).map(|&v| v as f64).collect();
            if values.is_empty() {
                return Vec::new();
            }
            let window_mean = values.iter().sum::<f64>() / values.len() as f64;
            let window_median = match median(&mut values) {
                Some(m) => m,
                None => return Vec::new(),
            };

            let factor = if water.std > 0.0 {
                ((upper - window_median) / (2.0 * water.std)).clamp(0.0, 1.0)
            } else if window_median <= water.mean {
                1.0
            } else {
                0.0
            };
            if factor <= 0.0 {
                return Vec::new();
            }
            let tolerance = params.threshold * factor;

            let mut added = Vec::new();
            for r in r0..r1 {
                for c in c0..c1 {
                    let v = score[(r, c)];
                    if current[(r, c)] == 0 && v.is_finite() && v as f64 - window_mean < -tolerance {
                        added.push((r, c));
                    }
                }
            }
            added
        })
        .collect();

    let mut mask = current.to_owned();
    let mut next = Vec::new();
    for (r, c) in additions {
        if mask[(r, c)] == 0 {
            mask[(r, c)] = 1;
            next.push((r, c));
        }
    }

    Some(GrowthStep {
        mask,
        frontier: next,
        water,
    })
}

/// Result of region growing
#[derive(Debug, Clone)]
pub struct RegionGrowingResult {
    pub mask: Mask,
    pub iterations: usize,
    /// False when the iteration cap stopped growth
    pub converged: bool,
    /// Pixels added to the seed
    pub grown: usize,
}

/// Grow `seed` until no pixel joins or `max_iterations` is reached.
///
/// Hitting the iteration cap is logged, not an error. The result always
/// contains the seed.
pub fn grow(score: &Raster<f32>, seed: &Mask, params: &RegionGrowingParams) -> Result<RegionGrowingResult> {
    params.validate()?;
    score.ensure_same_shape(seed)?;

    let data = nan_filled(score);
    let mut mask = seed.data().mapv(|v| u8::from(v != 0));
    let mut frontier: Vec<(usize, usize)> = mask
        .indexed_iter()
        .filter(|&(_, &m)| m != 0)
        .map(|(idx, _)| idx)
        .collect();
    let seed_count = frontier.len();

    let mut iterations = 0;
    let mut converged = false;
    loop {
        if frontier.is_empty() {
            converged = true;
            break;
        }
        if iterations == params.max_iterations {
            break;
        }
        match grow_step(data.view(), mask.view(), &frontier, params) {
            Some(step) => {
                debug!(
                    iteration = iterations + 1,
                    added = step.frontier.len(),
                    water_mean = step.water.mean,
                    water_std = step.water.std,
                    "region growing step"
                );
                mask = step.mask;
                frontier = step.frontier;
                iterations += 1;
            }
            None => {
                warn!("water statistics undefined, region growing skipped");
                converged = true;
                break;
            }
        }
    }

    if !converged {
        warn!(max_iterations = params.max_iterations, "region growing hit the iteration cap");
    }

    let result = seed.derive(mask, None)?;
    let grown = result.count_set().saturating_sub(seed.count_set());
    info!(iterations, converged, seed = seed_count, grown, "region growing");

    Ok(RegionGrowingResult {
        mask: result,
        iterations,
        converged,
        grown,
    })
}
