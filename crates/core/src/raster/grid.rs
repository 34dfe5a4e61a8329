//! Main Raster type

use crate::crs::{ensure_compatible, CRS};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS) and an optional no-data sentinel.
///
/// # Example
///
/// ```ignore
/// use sarflood_core::Raster;
///
/// let mut backscatter: Raster<f32> = Raster::filled(100, 100, -15.0);
/// backscatter.set(10, 20, -22.5)?;
/// let value = backscatter.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

/// Binary raster: 1 = set (e.g. flooded), 0 = not set.
pub type Mask = Raster<u8>;

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a zero-filled raster with the same georeference but another cell type
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Wrap `data` in a raster carrying this raster's georeference
    pub fn derive<U: RasterElement>(&self, data: Array2<U>, nodata: Option<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            return Err(Error::shape_mismatch(self.shape(), data.dim()));
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        })
    }

    /// Create a raster with the same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster has no cells
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a mutable view of the underlying data
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Ground area of one cell
    pub fn pixel_area(&self) -> f64 {
        self.transform.pixel_area()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Convert pixel coordinates to geographic coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Whether the cell at (row, col) holds a valid (non no-data) value.
    /// Out-of-bounds cells are not valid.
    pub fn is_valid_at(&self, row: usize, col: usize) -> bool {
        self.data
            .get((row, col))
            .map_or(false, |&v| !self.is_nodata(v))
    }

    /// All valid cell values as f64, in row-major order
    pub fn valid_values(&self) -> Vec<f64> {
        self.data
            .iter()
            .filter(|&&v| !self.is_nodata(v))
            .filter_map(|&v| v.to_f64())
            .collect()
    }

    /// Number of valid cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Build a mask from a per-cell predicate. No-data cells are never set.
    pub fn mask_where<F>(&self, predicate: F) -> Mask
    where
        F: Fn(T) -> bool,
    {
        let data = self
            .data
            .mapv(|v| u8::from(!self.is_nodata(v) && predicate(v)));
        Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Mask of every valid cell
    pub fn valid_mask(&self) -> Mask {
        self.mask_where(|_| true)
    }

    /// Fail with `ShapeMismatch` unless `other` has the same dimensions
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::shape_mismatch(self.shape(), other.shape()));
        }
        Ok(())
    }

    /// Fail unless `other` shares shape, geotransform and CRS with this raster
    pub fn ensure_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        self.ensure_same_shape(other)?;
        if !self.transform.same_grid(other.transform()) {
            return Err(Error::TransformMismatch);
        }
        ensure_compatible(self.crs(), other.crs())
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

impl Raster<u8> {
    /// Whether the mask is set at (row, col)
    pub fn is_set(&self, row: usize, col: usize) -> bool {
        self.data.get((row, col)).map_or(false, |&v| v != 0)
    }

    /// Number of set cells
    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Fraction of cells that are set (0 for an empty raster)
    pub fn set_fraction(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.count_set() as f64 / self.len() as f64
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, -17.5).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), -17.5);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_raster_statistics_skip_nodata() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f32).unwrap();
            }
        }
        raster.set(0, 0, f32::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_mask_where_excludes_nodata() {
        let mut raster: Raster<f32> = Raster::filled(3, 3, -20.0);
        raster.set(1, 1, f32::NAN).unwrap();
        raster.set(2, 2, 5.0).unwrap();

        let mask = raster.mask_where(|v| v < 0.0);
        assert_eq!(mask.count_set(), 7);
        assert!(!mask.is_set(1, 1));
        assert!(!mask.is_set(2, 2));
        assert_eq!(raster.valid_mask().count_set(), 8);
    }

    #[test]
    fn test_ensure_same_grid() {
        let a: Raster<f32> = Raster::new(4, 4);
        let b: Raster<u8> = Raster::new(4, 5);
        assert!(matches!(a.ensure_same_shape(&b), Err(Error::ShapeMismatch { .. })));

        let mut c: Raster<f32> = Raster::new(4, 4);
        c.set_transform(GeoTransform::new(100.0, 0.0, 1.0, -1.0));
        assert!(matches!(a.ensure_same_grid(&c), Err(Error::TransformMismatch)));
    }

    #[test]
    fn test_derive_keeps_georeference() {
        let mut src: Raster<f32> = Raster::new(2, 3);
        src.set_transform(GeoTransform::new(10.0, 20.0, 10.0, -10.0));
        src.set_crs(Some(CRS::from_epsg(32633)));

        let derived = src.derive(Array2::<u8>::ones((2, 3)), None).unwrap();
        assert_eq!(derived.transform(), src.transform());
        assert_eq!(derived.crs(), src.crs());
        assert!(src.derive(Array2::<u8>::ones((3, 3)), None).is_err());
    }
}
