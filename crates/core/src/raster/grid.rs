//! Single-band raster grid

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced single-band grid.
///
/// Multi-band imagery is a stack of equally shaped `Raster<f64>` bands,
/// assembled by the classification crate. Cells are stored row-major.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster with default georeferencing
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Wrap a row-major cell buffer
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let data = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        })
    }

    /// Allocate a zero-filled raster of another cell type that inherits
    /// this raster's transform and CRS. The classified output is created
    /// this way from the first feature band.
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Rows in the grid
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Columns in the grid
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total cell count
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the grid has no cells
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bounds-checked read
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        match self.data.get((row, col)) {
            Some(&v) => Ok(v),
            None => Err(self.out_of_bounds(row, col)),
        }
    }

    /// Unchecked read
    ///
    /// # Safety
    /// `row` and `col` must lie inside the grid.
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Bounds-checked write
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(self.out_of_bounds(row, col)),
        }
    }

    /// Unchecked write
    ///
    /// # Safety
    /// `row` and `col` must lie inside the grid.
    pub unsafe fn set_unchecked(&mut self, row: usize, col: usize, value: T) {
        unsafe { *self.data.uget_mut((row, col)) = value }
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    /// View of the cells
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// The underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Georeferencing transform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Coordinate reference system, if known
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// Declared nodata sentinel, if any
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Whether a cell value counts as nodata for this raster
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Min, max, mean and valid-cell count over the non-nodata cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut stats = RasterStatistics {
            min: None,
            max: None,
            mean: None,
            valid_count: 0,
            nodata_count: 0,
        };
        let mut sum = 0.0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                stats.nodata_count += 1;
                continue;
            }
            match value.to_f64() {
                Some(v) => sum += v,
                None => {
                    stats.nodata_count += 1;
                    continue;
                }
            }
            stats.valid_count += 1;
            if stats.min.map_or(true, |m| value < m) {
                stats.min = Some(value);
            }
            if stats.max.map_or(true, |m| value > m) {
                stats.max = Some(value);
            }
        }

        if stats.valid_count > 0 {
            stats.mean = Some(sum / stats.valid_count as f64);
        }
        stats
    }
}

/// Summary statistics over a raster's valid cells
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
    fn test_access_and_bounds() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
        assert!(raster.set(0, 10, 1.0).is_err());
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Raster::from_vec(vec![0u8; 5], 2, 3).is_err());
        let r = Raster::from_vec(vec![1u8, 2, 3, 4, 5, 6], 2, 3).unwrap();
        assert_eq!(r.get(1, 2).unwrap(), 6);
    }

    #[test]
    fn test_with_same_meta_copies_georeferencing() {
        let mut raster: Raster<f64> = Raster::new(4, 4);
        raster.set_transform(GeoTransform::new(10.0, 20.0, 2.0, -2.0));
        raster.set_crs(Some(Crs::from_epsg(2154)));

        let out: Raster<u8> = raster.with_same_meta(4, 4);
        assert_eq!(out.transform(), raster.transform());
        assert_eq!(out.crs(), raster.crs());
        assert_eq!(out.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_statistics_skip_nodata() {
        let mut raster: Raster<f32> = Raster::new(2, 2);
        raster.set(0, 0, 1.0).unwrap();
        raster.set(0, 1, 3.0).unwrap();
        raster.set(1, 0, -9999.0).unwrap();
        raster.set(1, 1, 2.0).unwrap();
        raster.set_nodata(Some(-9999.0));

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(3.0));
        assert_eq!(stats.mean, Some(2.0));
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.nodata_count, 1);
    }
}
