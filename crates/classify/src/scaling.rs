//! Min-max feature scaling
//!
//! Fitted once on the training matrix and reused verbatim for every later
//! prediction; training and prediction must always go through the same
//! parameters, which is why they travel inside the model bundle.

use mapcover_core::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature min/max scaling parameters.
///
/// For a feature spanning `[min, max]` the scaled output is
/// `2 * (x - max) / (max - min)`, i.e. the range `[-2, 0]`. Models already
/// trained depend on this asymmetric range, so it is kept as-is; constant
/// features (max == min) pass through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParams {
    max: Array1<f64>,
    min: Array1<f64>,
}

impl ScalingParams {
    /// Fit scaling parameters from a training matrix (samples x features)
    pub fn fit(x: &ArrayView2<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::Algorithm(
                "Cannot fit scaling on an empty sample matrix".into(),
            ));
        }

        let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let min = x.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));

        Ok(Self { max, min })
    }

    /// Identity parameters for a pipeline that skips scaling.
    ///
    /// With max == min every feature falls in the constant-feature branch of
    /// `apply`, so samples pass through unchanged.
    pub fn identity(dim: usize) -> Self {
        Self {
            max: Array1::zeros(dim),
            min: Array1::zeros(dim),
        }
    }

    /// Number of features these parameters were fitted on
    pub fn dim(&self) -> usize {
        self.max.len()
    }

    /// Per-feature maximum vector
    pub fn max(&self) -> &Array1<f64> {
        &self.max
    }

    /// Per-feature minimum vector
    pub fn min(&self) -> &Array1<f64> {
        &self.min
    }

    /// Rebuild parameters from persisted vectors
    pub fn from_vectors(max: Array1<f64>, min: Array1<f64>) -> Result<Self> {
        if max.len() != min.len() {
            return Err(Error::ModelLoad(format!(
                "Scaling vectors disagree on dimension: max has {}, min has {}",
                max.len(),
                min.len()
            )));
        }
        Ok(Self { max, min })
    }

    /// Apply the fitted scaling to a sample matrix
    pub fn apply(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: x.ncols(),
            });
        }

        let mut scaled = x.to_owned();
        for i in 0..self.dim() {
            let den = self.max[i] - self.min[i];
            if den != 0.0 {
                let max_i = self.max[i];
                scaled
                    .column_mut(i)
                    .mapv_inplace(|v| 2.0 * (v - max_i) / den);
            }
        }

        Ok(scaled)
    }
}
