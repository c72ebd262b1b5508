//! Training-sample extraction from labelled rasters
//!
//! Turns a band stack plus an aligned label raster into the (n, d) sample
//! matrix and label vector the learner consumes. Label 0 marks background
//! and never yields a sample.

use crate::stack::BandStack;
use mapcover_core::{Error, Raster, Result};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Gather one sample per labelled pixel, in row-major raster order.
///
/// The label raster must share the stack's extent. Pixels with label 0 are
/// skipped; an image without any labelled pixel is an error.
pub fn extract_samples(
    stack: &BandStack<'_>,
    labels: &Raster<u8>,
) -> Result<(Array2<f64>, Vec<u8>)> {
    let (rows, cols) = stack.shape();
    if labels.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: labels.rows(),
            ac: labels.cols(),
        });
    }

    let dim = stack.dim();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let label = unsafe { labels.get_unchecked(r, c) };
            if label == 0 {
                continue;
            }
            for b in 0..dim {
                x.push(unsafe { stack.band(b).get_unchecked(r, c) });
            }
            y.push(label);
        }
    }

    if y.is_empty() {
        return Err(Error::InvalidParameter {
            name: "labels",
            value: "0 labelled pixels".into(),
            reason: "label raster contains no pixel with label > 0".into(),
        });
    }

    let n = y.len();
    let x = Array2::from_shape_vec((n, dim), x)
        .map_err(|e| Error::Algorithm(format!("sample matrix shape: {}", e)))?;
    Ok((x, y))
}

/// Split samples into a training and a held-out part, stratified by class.
///
/// `train_fraction` is the share of each class kept for training, in
/// (0, 1). Every class keeps at least one training sample. The shuffle is
/// seeded per class by its ordinal in ascending label order, so the split
/// is deterministic.
pub fn split_train_test(
    x: &Array2<f64>,
    y: &[u8],
    train_fraction: f64,
) -> Result<(Array2<f64>, Vec<u8>, Array2<f64>, Vec<u8>)> {
    if x.nrows() != y.len() {
        return Err(Error::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::InvalidParameter {
            name: "train_fraction",
            value: train_fraction.to_string(),
            reason: "must lie strictly between 0 and 1".into(),
        });
    }

    let mut classes: Vec<u8> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();
    for (ordinal, &label) in classes.iter().enumerate() {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == label).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(ordinal as u64);
        members.shuffle(&mut rng);

        let n_train = ((members.len() as f64 * train_fraction).round() as usize)
            .clamp(1, members.len());
        train_idx.extend_from_slice(&members[..n_train]);
        test_idx.extend_from_slice(&members[n_train..]);
    }

    let pick = |idx: &[usize]| -> (Array2<f64>, Vec<u8>) {
        let xs = x.select(ndarray::Axis(0), idx);
        let ys = idx.iter().map(|&i| y[i]).collect();
        (xs, ys)
    };
    let (x_train, y_train) = pick(&train_idx);
    let (x_test, y_test) = pick(&test_idx);
    Ok((x_train, y_train, x_test, y_test))
}
