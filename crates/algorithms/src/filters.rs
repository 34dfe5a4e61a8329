//! Gaussian filtering of score grids
//!
//! Separable, NaN-aware normalized convolution: no-data cells contribute no
//! weight and stay no-data in the output. The kernel is truncated at four
//! standard deviations and renormalised at raster borders.

use ndarray::{Array2, ArrayView2};
use crate::maybe_rayon::*;
use sarflood_core::raster::Raster;
use sarflood_core::{Error, Result};

/// Kernel truncation in standard deviations
pub const TRUNCATE: f64 = 4.0;

/// Normalised 1D Gaussian kernel of radius `ceil(TRUNCATE * sigma)`
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma).ceil().max(0.0) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|d| (-((d * d) as f64) / two_sigma_sq).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// Blur a grid with a Gaussian of standard deviation `sigma` (in cells).
///
/// Non-finite cells are treated as no-data. A non-positive `sigma` returns a copy.
pub fn gaussian_blur(data: ArrayView2<'_, f32>, sigma: f64) -> Result<Array2<f32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Ok(data.to_owned());
    }

    let (rows, cols) = data.dim();
    let kernel = gaussian_kernel(sigma);
    let r = (kernel.len() / 2) as isize;

    // Horizontal pass: weighted sum and weight of valid cells
    let horizontal: Vec<(f64, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                let mut num = 0.0;
                let mut den = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let nc = col as isize + k as isize - r;
                    if nc < 0 || nc as usize >= cols {
                        continue;
                    }
                    let v = data[(row, nc as usize)];
                    if v.is_finite() {
                        num += w * v as f64;
                        den += w;
                    }
                }
                out.push((num, den));
            }
            out
        })
        .collect();

    let output: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut out = vec![f32::NAN; cols];
            for (col, cell) in out.iter_mut().enumerate() {
                if !data[(row, col)].is_finite() {
                    continue;
                }
                let mut num = 0.0;
                let mut den = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let nr = row as isize + k as isize - r;
                    if nr < 0 || nr as usize >= rows {
                        continue;
                    }
                    let (hn, hd) = horizontal[nr as usize * cols + col];
                    num += w * hn;
                    den += w * hd;
                }
                if den > 0.0 {
                    *cell = (num / den) as f32;
                }
            }
            out
        })
        .collect();

    Array2::from_shape_vec((rows, cols), output).map_err(|e| Error::Other(e.to_string()))
}

/// Gaussian smoothing of a raster. Output no-data is NaN.
pub fn gaussian_smoothing(raster: &Raster<f32>, sigma: f64) -> Result<Raster<f32>> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(Error::InvalidParameter {
            name: "sigma",
            value: sigma.to_string(),
            reason: "must be a non-negative finite number".to_string(),
        });
    }
    let data = crate::statistics::nan_filled(raster);
    let blurred = gaussian_blur(data.view(), sigma)?;
    raster.derive(blurred, Some(f32::NAN))
}
