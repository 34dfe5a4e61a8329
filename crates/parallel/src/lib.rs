//! # SARFlood Parallel
//!
//! Parallel processing strategies for the flood mapping pipeline.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, all-cores or fixed-size worker pools
//! - Disjoint tiling of a raster into fixed-size windows

pub mod strategy;
pub mod tiled;

pub use strategy::{ParallelStrategy, ProcessingMode};
pub use tiled::{Tile, TileIterator};
