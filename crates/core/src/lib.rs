//! # MapCover Core
//!
//! Core types and I/O for the MapCover land-cover classifier.
//!
//! This crate provides:
//! - `Raster<T>`: Generic single-band raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `Crs`: Coordinate Reference System handling
//! - `Block` / `BlockIterator`: windows for out-of-core processing
//! - Native GeoTIFF I/O

pub mod block;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use block::{Block, BlockIterator};
pub use crs::Crs;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::block::{Block, BlockIterator};
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}
