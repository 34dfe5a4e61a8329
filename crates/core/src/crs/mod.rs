//! Coordinate Reference System handling
//!
//! Flood mapping never reprojects: every raster of a run must already share
//! one CRS. This module only carries the CRS through the pipeline and checks
//! that co-registered inputs agree.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// UTM zone CRS on WGS84 (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u8, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone as u32)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual WKT comparison is conservative: formatting differences count as different
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Check that two optional CRS can be combined in one computation.
///
/// A missing CRS on either side is accepted (plain arrays, synthetic data).
pub fn ensure_compatible(a: Option<&CRS>, b: Option<&CRS>) -> Result<()> {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => {
            Err(Error::CrsMismatch(a.identifier(), b.identifier()))
        }
        _ => Ok(()),
    }
}
