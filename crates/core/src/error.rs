//! Error types for SARFlood
//!
//! Configuration and shape-contract violations are fatal. Expected data
//! conditions (undefined bimodality, empty consensus masks) are not errors
//! and never appear here.

use thiserror::Error;

/// Main error type for SARFlood operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster shape mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    ShapeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Geotransform mismatch between rasters of the same stack")]
    TransformMismatch,

    #[error("Degenerate baseline: {members} member(s), at least 3 are required for a change score")]
    DegenerateBaseline { members: usize },

    #[error("Unknown thresholding method: {0} (expected otsu or kittler)")]
    ThresholdingMethodUnknown(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Attach the name of the pipeline stage that produced this error
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            // keep the innermost stage
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Helper for `ShapeMismatch` from two `(rows, cols)` pairs
    pub fn shape_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Error::ShapeMismatch {
            er: expected.0,
            ec: expected.1,
            ar: actual.0,
            ac: actual.1,
        }
    }
}

/// Result type alias for SARFlood operations
pub type Result<T> = std::result::Result<T, Error>;
