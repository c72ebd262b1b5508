//! Cell-value trait for generic rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types usable as raster cells.
///
/// Feature bands are read as floats, class labels and masks as unsigned
/// integers. The nodata hooks let `Raster<T>` treat both uniformly.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Conventional nodata sentinel for this cell type
    fn default_nodata() -> Self;

    /// Whether `self` counts as nodata given the raster's declared sentinel
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// True for floating point cell types
    fn is_float() -> bool;

    /// Lossy widening to f64 for statistics
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! int_element {
    ($($t:ty),+) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }

            fn is_float() -> bool {
                false
            }
        }
    )+};
}

macro_rules! float_element {
    ($($t:ty),+) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            // NaN is always nodata; a declared sentinel matches within a
            // small tolerance so values that round-tripped through a file
            // still compare equal
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                self.is_nan()
                    || nodata.is_some_and(|nd| (*self - nd).abs() < <$t>::EPSILON * 100.0)
            }

            fn is_float() -> bool {
                true
            }
        }
    )+};
}

int_element!(u8, u16, u32, i16, i32);
float_element!(f32, f64);
