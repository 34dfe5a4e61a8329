//! Incidence-normalised change score
//!
//! Each raster is weighted by `cos(incidence)`. For every pixel the weighted
//! flood value is compared with the mean and sample standard deviation of the
//! weighted baseline members:
//!
//! `t = (w * flood - mean) / (std / sqrt(n))`
//!
//! Strongly negative scores mark pixels much darker than their history.

use ndarray::Array2;
use crate::maybe_rayon::*;
use sarflood_core::raster::Raster;
use sarflood_core::{Algorithm, Error, Result};

use super::baseline::BaselineStack;
use crate::statistics::{moments::mean_std, quantile};

/// Smallest baseline with a defined sample standard deviation and a
/// meaningful t-statistic
pub const MIN_BASELINE_MEMBERS: usize = 3;

/// Change score of a flood acquisition against a baseline
#[derive(Debug, Clone)]
pub struct ChangeScore {
    /// t-statistic per pixel (NaN = no-data)
    pub score: Raster<f32>,
    /// Weighted baseline mean
    pub mean: Raster<f32>,
    /// Weighted baseline sample standard deviation
    pub std: Raster<f32>,
    /// Number of valid baseline members per pixel
    pub count: Raster<u16>,
}

/// `cos(incidence)` weights. Invalid angles and grazing geometry
/// (cos <= 0) become NaN.
pub fn incidence_weights(incidence: &Raster<f32>) -> Raster<f32> {
    let mut out = incidence.like(f32::NAN);
    out.set_nodata(Some(f32::NAN));
    for (w, &angle) in out.data_mut().iter_mut().zip(incidence.data().iter()) {
        if incidence.is_nodata(angle) {
            continue;
        }
        let c = (angle as f64).to_radians().cos();
        if c > 0.0 {
            *w = c as f32;
        }
    }
    out
}

/// Compute the change score of `flood` against `baseline`.
///
/// `incidence` (degrees) is shared by all acquisitions; without it every
/// weight is 1. Pixels with fewer than [`MIN_BASELINE_MEMBERS`] valid
/// members, a zero baseline deviation, or no-data in the flood or incidence
/// raster are NaN.
///
/// # Errors
/// `DegenerateBaseline` for stacks shorter than [`MIN_BASELINE_MEMBERS`];
/// grid mismatches between the flood raster, incidence raster and baseline.
pub fn change_score(
    baseline: &BaselineStack,
    flood: &Raster<f32>,
    incidence: Option<&Raster<f32>>,
) -> Result<ChangeScore> {
    if baseline.len() < MIN_BASELINE_MEMBERS {
        return Err(Error::DegenerateBaseline {
            members: baseline.len(),
        });
    }

    let template = baseline.template();
    template.ensure_same_grid(flood)?;
    if let Some(inc) = incidence {
        template.ensure_same_grid(inc)?;
    }

    let (rows, cols) = flood.shape();
    let weights = incidence.map(incidence_weights);
    let layers = baseline.layers();

    let cells: Vec<(f32, f32, f32, u16)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = Vec::with_capacity(cols);
            let mut samples = Vec::with_capacity(layers.len());

            for col in 0..cols {
                let w = match &weights {
                    Some(w) => f64::from(unsafe { w.get_unchecked(row, col) }),
                    None => 1.0,
                };

                samples.clear();
                if w.is_finite() {
                    for layer in layers {
                        let v = unsafe { layer.get_unchecked(row, col) };
                        if !layer.is_nodata(v) {
                            samples.push(w * v as f64);
                        }
                    }
                }

                let n = samples.len();
                if n < MIN_BASELINE_MEMBERS {
                    out.push((f32::NAN, f32::NAN, f32::NAN, n as u16));
                    continue;
                }

                let (mean, std) = match mean_std(&samples, 1) {
                    Some(ms) => ms,
                    None => {
                        out.push((f32::NAN, f32::NAN, f32::NAN, n as u16));
                        continue;
                    }
                };

                let f = unsafe { flood.get_unchecked(row, col) };
                let t = if flood.is_nodata(f) || std <= 0.0 {
                    f32::NAN
                } else {
                    ((w * f as f64 - mean) / (std / (n as f64).sqrt())) as f32
                };

                out.push((t, mean as f32, std as f32, n as u16));
            }
            out
        })
        .collect();

    let mut score = Vec::with_capacity(cells.len());
    let mut mean = Vec::with_capacity(cells.len());
    let mut std = Vec::with_capacity(cells.len());
    let mut count = Vec::with_capacity(cells.len());
    for (t, m, s, n) in cells {
        score.push(t);
        mean.push(m);
        std.push(s);
        count.push(n);
    }

    let shape = |v| Array2::from_shape_vec((rows, cols), v).map_err(|e| Error::Other(e.to_string()));
    let count = Array2::from_shape_vec((rows, cols), count).map_err(|e| Error::Other(e.to_string()))?;

    Ok(ChangeScore {
        score: flood.derive(shape(score)?, Some(f32::NAN))?,
        mean: flood.derive(shape(mean)?, Some(f32::NAN))?,
        std: flood.derive(shape(std)?, Some(f32::NAN))?,
        count: flood.derive(count, None)?,
    })
}

/// Check that `low` and `high` are ordered quantiles within [0, 1]
pub fn clip_quantile_bounds(low: f64, high: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
        return Err(Error::InvalidParameter {
            name: "clip_quantiles",
            value: format!("({}, {})", low, high),
            reason: "quantiles must satisfy 0 <= low < high <= 1".to_string(),
        });
    }
    Ok(())
}

/// Clip valid scores to the `[low, high]` quantiles of their distribution.
///
/// Values outside the range are set to the bound, not discarded. No-data
/// cells stay no-data.
pub fn clip_to_quantiles(score: &Raster<f32>, low: f64, high: f64) -> Result<Raster<f32>> {
    clip_quantile_bounds(low, high)?;

    let mut values = score.valid_values();
    if values.is_empty() {
        return Ok(score.clone());
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let (lo, hi) = match (quantile(&values, low), quantile(&values, high)) {
        (Some(lo), Some(hi)) => (lo as f32, hi as f32),
        _ => return Ok(score.clone()),
    };

    let mut out = score.clone();
    out.set_nodata(Some(f32::NAN));
    for v in out.data_mut().iter_mut() {
        if score.is_nodata(*v) {
            *v = f32::NAN;
        } else {
            *v = v.clamp(lo, hi);
        }
    }
    Ok(out)
}

/// Parameters for [`ChangeScorer`]
#[derive(Debug, Clone)]
pub struct ChangeScoreParams {
    /// Quantile clipping of the resulting score; `None` keeps raw values
    pub clip_quantiles: Option<(f64, f64)>,
}

impl Default for ChangeScoreParams {
    fn default() -> Self {
        Self {
            clip_quantiles: Some((0.01, 0.99)),
        }
    }
}

/// Change scoring stage
#[derive(Debug, Clone, Default)]
pub struct ChangeScorer;

impl Algorithm for ChangeScorer {
    type Input = (BaselineStack, Raster<f32>, Option<Raster<f32>>);
    type Output = ChangeScore;
    type Params = ChangeScoreParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ChangeScore"
    }

    fn description(&self) -> &'static str {
        "Incidence-normalised t-statistic of a flood acquisition against a baseline stack"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (baseline, flood, incidence) = input;
        let mut result = change_score(&baseline, &flood, incidence.as_ref())?;
        if let Some((low, high)) = params.clip_quantiles {
            result.score = clip_to_quantiles(&result.score, low, high)?;
        }
        Ok(result)
    }
}
