//! Multi-scale bimodality masking
//!
//! The score raster is cut into disjoint square tiles at several window
//! sizes. A tile votes for its pixels when its score distribution is bimodal
//! and its mean is negative (darkening dominates). Pixels whose mean vote
//! across scales exceeds the segmentation fraction form the mask that the
//! global threshold is estimated from.

use ndarray::{s, Array2, CowArray, Ix2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use sarflood_core::{Error, Mask, Raster, Result};
use sarflood_parallel::{ParallelStrategy, ProcessingMode, Tile, TileIterator};

use crate::statistics::{bimodality_coefficient, is_bimodal, nan_filled, BimodalityParams, UNIFORM_BIMODALITY};

/// Parameters for multi-scale bimodality masking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiscaleParams {
    /// Smallest tile side in pixels
    pub window_min: usize,
    /// Largest tile side in pixels (inclusive)
    pub window_max: usize,
    pub window_step: usize,
    /// A tile is bimodal when its coefficient exceeds this value
    #[serde(rename = "threshold")]
    pub bimodality_threshold: f64,
    /// A pixel is selected when its mean vote exceeds this fraction
    pub segmentation_fraction: f64,
    #[serde(flatten)]
    pub bimodality: BimodalityParams,
}

impl Default for MultiscaleParams {
    fn default() -> Self {
        Self {
            window_min: 50,
            window_max: 500,
            window_step: 50,
            bimodality_threshold: UNIFORM_BIMODALITY,
            segmentation_fraction: 0.1,
            bimodality: BimodalityParams::default(),
        }
    }
}

impl MultiscaleParams {
    /// Tile sizes visited, ascending
    pub fn window_sizes(&self) -> Vec<usize> {
        (self.window_min..=self.window_max)
            .step_by(self.window_step.max(1))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_min == 0 || self.window_step == 0 || self.window_max < self.window_min {
            return Err(Error::InvalidParameter {
                name: "window",
                value: format!("{}..={} step {}", self.window_min, self.window_max, self.window_step),
                reason: "need 0 < window_min <= window_max and window_step > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.bimodality_threshold) {
            return Err(Error::InvalidParameter {
                name: "bimodality_threshold",
                value: self.bimodality_threshold.to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.segmentation_fraction) {
            return Err(Error::InvalidParameter {
                name: "segmentation_fraction",
                value: self.segmentation_fraction.to_string(),
                reason: "must be within [0, 1)".to_string(),
            });
        }
        Ok(())
    }
}

/// Output of multi-scale bimodality masking
#[derive(Debug, Clone)]
pub struct BimodalityMask {
    /// Selected pixels
    pub mask: Mask,
    /// Mean tile vote across scales (NaN where the score is no-data)
    pub fraction: Raster<f32>,
    /// True when no pixel reached consensus and every valid pixel was selected
    pub fell_back: bool,
}

/// Build the bimodality mask of a change score.
///
/// Tiles of one scale are evaluated in parallel according to `mode`. Tiles
/// cut by the raster edge are padded to full size by repeating the edge
/// row and column.
pub fn multiscale_bimodality_mask(
    score: &Raster<f32>,
    params: &MultiscaleParams,
    mode: ProcessingMode,
) -> Result<BimodalityMask> {
    params.validate()?;

    let (rows, cols) = score.shape();
    let data = nan_filled(score);
    let sizes = params.window_sizes();
    let mut votes = Array2::<f32>::zeros((rows, cols));

    for &size in &sizes {
        let tiles: Vec<_> = TileIterator::new(rows, cols, size).collect();
        let flags = mode.par_map(tiles.clone(), |tile| -> Result<bool> {
            let block = padded_tile(&data, &tile);
            let (sum, n) = block
                .iter()
                .filter(|v| v.is_finite())
                .fold((0.0_f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
            if n == 0 || sum / n as f64 >= 0.0 {
                return Ok(false);
            }
            let bc = bimodality_coefficient(block.view(), &params.bimodality)?;
            Ok(is_bimodal(bc, params.bimodality_threshold))
        })?;

        let mut flagged = 0usize;
        for (tile, flag) in tiles.iter().zip(flags) {
            if flag? {
                flagged += 1;
                votes
                    .slice_mut(s![tile.row_range(), tile.col_range()])
                    .mapv_inplace(|v| v + 1.0);
            }
        }
        debug!(window = size, tiles = tiles.len(), bimodal_tiles = flagged, "bimodality scale");
    }

    let n_scales = sizes.len() as f32;
    let fraction_data = Zip::from(&votes)
        .and(&data)
        .map_collect(|&v, &x| if x.is_finite() { v / n_scales } else { f32::NAN });
    let fraction = score.derive(fraction_data, Some(f32::NAN))?;

    let threshold = params.segmentation_fraction as f32;
    let mut mask = fraction.mask_where(|f| f > threshold);
    let mut fell_back = false;

    if mask.count_set() == 0 {
        let valid = score.valid_mask();
        if valid.count_set() > 0 {
            warn!("no tile reached bimodality consensus, using all valid pixels");
            mask = valid;
            fell_back = true;
        }
    }

    info!(
        scales = sizes.len(),
        selected = mask.count_set(),
        fell_back,
        "bimodality mask"
    );

    Ok(BimodalityMask {
        mask,
        fraction,
        fell_back,
    })
}

/// Tile contents at nominal size, repeating the last in-raster row and
/// column where the tile runs past the raster edge
fn padded_tile<'a>(data: &'a Array2<f32>, tile: &Tile) -> CowArray<'a, f32, Ix2> {
    if !tile.is_padded() {
        return data.slice(s![tile.row_range(), tile.col_range()]).into();
    }
    let last_row = tile.rows - 1;
    let last_col = tile.cols - 1;
    Array2::from_shape_fn((tile.size, tile.size), |(r, c)| {
        data[(tile.row_offset + r.min(last_row), tile.col_offset + c.min(last_col))]
    })
    .into()
}
