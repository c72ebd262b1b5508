//! Multi-band raster stacks
//!
//! A feature cube is a stack of equally shaped single-band rasters, one per
//! spectral band. The stack reads rectangular windows into a
//! (pixels x bands) sample matrix, which is the unit of work for both
//! training-sample extraction and block classification.

use mapcover_core::{Block, Crs, Error, GeoTransform, Raster, Result};
use ndarray::Array2;
use tracing::warn;

/// A borrowed stack of co-registered feature bands.
#[derive(Debug)]
pub struct BandStack<'a> {
    bands: Vec<&'a Raster<f64>>,
}

impl<'a> BandStack<'a> {
    /// Build a stack; all bands must share the same shape.
    pub fn new(bands: Vec<&'a Raster<f64>>) -> Result<Self> {
        let first = bands.first().ok_or_else(|| {
            Error::Algorithm("A band stack requires at least one band".into())
        })?;
        let (rows, cols) = first.shape();

        for band in bands.iter().skip(1) {
            if band.shape() != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: band.rows(),
                    ac: band.cols(),
                });
            }
        }

        // Bands from differently projected files still classify, but the
        // output inherits the first band's georeferencing
        if let Some(first_crs) = first.crs() {
            if bands
                .iter()
                .skip(1)
                .filter_map(|band| band.crs())
                .any(|crs| !crs.is_equivalent(first_crs))
            {
                warn!("band stack mixes coordinate systems; the first band's CRS is kept");
            }
        }

        Ok(Self { bands })
    }

    /// Number of bands (the feature dimension d)
    pub fn dim(&self) -> usize {
        self.bands.len()
    }

    /// Raster shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].shape()
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.bands[0].rows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.bands[0].cols()
    }

    /// Geotransform of the stack (taken from the first band)
    pub fn transform(&self) -> &GeoTransform {
        self.bands[0].transform()
    }

    /// CRS of the stack (taken from the first band)
    pub fn crs(&self) -> Option<&Crs> {
        self.bands[0].crs()
    }

    /// First band, used to clone metadata onto outputs
    pub fn reference_band(&self) -> &Raster<f64> {
        self.bands[0]
    }

    /// Band by index; panics when out of range
    pub fn band(&self, index: usize) -> &Raster<f64> {
        self.bands[index]
    }

    /// Read a block into a (pixels x bands) matrix, pixels in row-major
    /// order within the block.
    pub fn read_block(&self, block: &Block) -> Array2<f64> {
        let mut x = Array2::<f64>::zeros((block.len(), self.dim()));
        for (b, band) in self.bands.iter().enumerate() {
            for lr in 0..block.rows {
                for lc in 0..block.cols {
                    let (r, c) = block.to_source(lr, lc);
                    x[(lr * block.cols + lc, b)] = unsafe { band.get_unchecked(r, c) };
                }
            }
        }
        x
    }
}
