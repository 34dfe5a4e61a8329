//! Pre-event baseline stack

use sarflood_core::{Error, Raster, Result};

/// Ordered stack of pre-event backscatter rasters on one grid.
///
/// Every member shares the first member's shape, geotransform and CRS.
#[derive(Debug, Clone)]
pub struct BaselineStack {
    layers: Vec<Raster<f32>>,
    labels: Vec<String>,
}

impl BaselineStack {
    /// Build a stack, labelling members by position
    pub fn new(layers: Vec<Raster<f32>>) -> Result<Self> {
        let labels = (0..layers.len()).map(|i| format!("baseline_{}", i)).collect();
        Self::with_labels(layers, labels)
    }

    /// Build a stack with one label (e.g. acquisition date) per member
    pub fn with_labels(layers: Vec<Raster<f32>>, labels: Vec<String>) -> Result<Self> {
        let first = layers
            .first()
            .ok_or(Error::DegenerateBaseline { members: 0 })?;

        if labels.len() != layers.len() {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: labels.len().to_string(),
                reason: format!("expected one label per layer ({})", layers.len()),
            });
        }

        for layer in layers.iter().skip(1) {
            first.ensure_same_grid(layer)?;
        }

        Ok(Self { layers, labels })
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Grid shape shared by all members
    pub fn shape(&self) -> (usize, usize) {
        self.template().shape()
    }

    /// First member; carries the stack's georeference
    pub fn template(&self) -> &Raster<f32> {
        &self.layers[0]
    }

    pub fn layers(&self) -> &[Raster<f32>] {
        &self.layers
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Iterate over (label, layer) pairs in acquisition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f32>)> {
        self.labels.iter().map(String::as_str).zip(self.layers.iter())
    }
}
