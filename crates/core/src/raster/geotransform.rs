//! Affine georeferencing

use serde::{Deserialize, Serialize};

/// North-up affine mapping between pixel indices and map coordinates.
///
/// `x = origin_x + col * pixel_width`, `y = origin_y + row * pixel_height`;
/// `pixel_height` is negative for the usual north-up orientation. The
/// classifier copies the source transform verbatim onto its output raster,
/// so no rotation terms are carried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Map X of the raster's upper-left corner
    pub origin_x: f64,
    /// Map Y of the raster's upper-left corner
    pub origin_y: f64,
    /// Cell width in map units
    pub pixel_width: f64,
    /// Cell height in map units, negative for north-up
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Map coordinates of a pixel's center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a map point; floor for indices.
    /// Degenerate cell sizes yield NaN rather than dividing by zero.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width.abs() < 1e-12 || self.pixel_height.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Cell edge length, assuming square pixels
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// (min_x, min_y, max_x, max_y) of a raster with these dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let far_x = self.origin_x + width as f64 * self.pixel_width;
        let far_y = self.origin_y + height as f64 * self.pixel_height;
        (
            self.origin_x.min(far_x),
            self.origin_y.min(far_y),
            self.origin_x.max(far_x),
            self.origin_y.max(far_y),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds_north_up() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        assert_eq!(gt.bounds(100, 100), (0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_degenerate_cell_size() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        let (col, _) = gt.geo_to_pixel(5.0, 5.0);
        assert!(col.is_nan());
    }
}
