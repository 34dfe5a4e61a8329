//! Mathematical morphology for flood masks
//!
//! - **Dilation**: maximum filter, used to widen steep-terrain exclusions
//! - **Labelling**: connected components of set or unset cells
//! - **Refinement**: minimum-mapping-unit hole filling, diameter opening
//!   and small-object removal

mod dilate;
mod element;
mod label;
mod refine;

pub use dilate::{dilate, Dilate, DilateParams};
pub use element::StructuringElement;
pub use label::{label_components, Component, Labeling};
pub use refine::{
    diameter_opening, fill_small_holes, refine_mask, remove_small_objects, MorphologicalRefiner,
    RefineParams,
};
