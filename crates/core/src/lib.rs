//! # SARFlood Core
//!
//! Core types, traits and I/O for SAR flood mapping.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid (scores as `Raster<f32>`, masks as [`Mask`])
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `Connectivity`: pixel adjacency used by labelling and morphology
//! - The error taxonomy shared by every pipeline stage
//! - Native GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{Connectivity, GeoTransform, Mask, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Connectivity, GeoTransform, Mask, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for the pipeline stages.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
