//! Error taxonomy shared by all MapCover crates

use thiserror::Error;

/// Everything that can go wrong across raster handling, training and
/// classification. Input validation errors are raised before any output
/// file is created; see the individual operations for their guarantees.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("index ({row}, {col}) outside raster of {rows}x{cols}")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("raster extent mismatch: expected {er}x{ec}, got {ar}x{ac}")]
    SizeMismatch {
        er: usize,
        ec: usize,
        ar: usize,
        ac: usize,
    },

    #[error("feature dimension mismatch: model expects {expected} bands, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Raised during covariance inversion when a regularized eigenvalue is
    /// not positive; increase tau rather than letting a log of a
    /// non-positive value poison the scores.
    #[error("singular covariance for class {class}: regularized eigenvalue {eigenvalue}")]
    SingularCovariance { class: u8, eigenvalue: f64 },

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
