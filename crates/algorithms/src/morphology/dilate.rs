//! Morphological dilation (maximum filter)
//!
//! Replaces each pixel with the maximum valid value in its structuring
//! element neighbourhood. The window is clipped at raster borders and
//! no-data neighbours are ignored.

use ndarray::Array2;
use crate::maybe_rayon::*;
use sarflood_core::raster::Raster;
use sarflood_core::{Algorithm, Error, Result};

use super::element::StructuringElement;

/// Parameters for morphological dilation
#[derive(Debug, Clone, Default)]
pub struct DilateParams {
    /// Structuring element shape
    pub element: StructuringElement,
}

/// Dilation algorithm
#[derive(Debug, Clone, Default)]
pub struct Dilate;

impl Algorithm for Dilate {
    type Input = Raster<f32>;
    type Output = Raster<f32>;
    type Params = DilateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Dilate"
    }

    fn description(&self) -> &'static str {
        "Morphological dilation (maximum filter over structuring element)"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        dilate(&input, &params.element)
    }
}

/// Perform morphological dilation on a raster
///
/// Each valid output pixel is the maximum of the valid cells under the
/// structuring element. No-data pixels stay no-data (NaN).
pub fn dilate(raster: &Raster<f32>, element: &StructuringElement) -> Result<Raster<f32>> {
    element.validate()?;

    let (rows, cols) = raster.shape();
    let offsets = element.offsets();

    let output_data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f32::NAN; cols];

            for (col, row_data_col) in row_data.iter_mut().enumerate() {
                let center = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(center) {
                    continue;
                }

                let mut max_val = center;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                    if !raster.is_nodata(v) && v > max_val {
                        max_val = v;
                    }
                }
                *row_data_col = max_val;
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    raster.derive(data, Some(f32::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sarflood_core::GeoTransform;

    fn make_raster(rows: usize, cols: usize, value: f32) -> Raster<f32> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_dilate_uniform() {
        let raster = make_raster(7, 7, 5.0);
        let result = dilate(&raster, &StructuringElement::Square(1)).unwrap();
        let val = result.get(3, 3).unwrap();
        assert!((val - 5.0).abs() < 1e-6, "Uniform dilation should preserve value, got {}", val);
    }

    #[test]
    fn test_dilate_picks_maximum() {
        let mut raster = make_raster(7, 7, 5.0);
        raster.set(3, 4, 20.0).unwrap();

        let result = dilate(&raster, &StructuringElement::Square(1)).unwrap();
        assert_eq!(result.get(3, 3).unwrap(), 20.0);
        assert_eq!(result.get(3, 6).unwrap(), 5.0);
    }

    #[test]
    fn test_dilate_edges_clamped() {
        let mut raster = make_raster(7, 7, 5.0);
        raster.set(0, 1, 12.0).unwrap();
        let result = dilate(&raster, &StructuringElement::Square(1)).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 12.0);
        assert_eq!(result.get(6, 6).unwrap(), 5.0);
    }

    #[test]
    fn test_dilate_nodata_ignored() {
        let mut raster = make_raster(7, 7, 5.0);
        raster.set_nodata(Some(-9999.0));
        raster.set(3, 3, -9999.0).unwrap();

        let result = dilate(&raster, &StructuringElement::Square(1)).unwrap();
        assert!(result.get(3, 3).unwrap().is_nan());
        assert_eq!(result.get(3, 2).unwrap(), 5.0);
    }

    #[test]
    fn test_dilate_cross_element() {
        let mut raster = make_raster(7, 7, 5.0);
        raster.set(2, 2, 99.0).unwrap();

        let result = dilate(&raster, &StructuringElement::Cross(1)).unwrap();
        let val = result.get(3, 3).unwrap();
        assert!((val - 5.0).abs() < 1e-6, "Cross should not include diagonal, got {}", val);
    }
}
