//! Dense linear algebra helpers for the Gaussian classifier
//!
//! Covariance matrices here are small (d x d for d spectral bands), so the
//! eigendecomposition uses cyclic Jacobi rotations rather than pulling in a
//! BLAS/LAPACK backend.

use mapcover_core::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Population covariance matrix of the rows of `x` (normalized by n, not
/// n-1, to stay consistent with the per-class update formulae).
pub fn population_covariance(x: &ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = x.nrows();
    let d = x.ncols();
    if n == 0 {
        return Err(Error::Algorithm("Covariance of an empty sample set".into()));
    }

    let mean = x.mean_axis(Axis(0)).expect("n > 0");

    let mut cov = Array2::<f64>::zeros((d, d));
    for row in x.rows() {
        for i in 0..d {
            let di = row[i] - mean[i];
            for j in i..d {
                cov[(i, j)] += di * (row[j] - mean[j]);
            }
        }
    }
    for i in 0..d {
        for j in i..d {
            cov[(i, j)] /= n as f64;
            if j > i {
                cov[(j, i)] = cov[(i, j)];
            }
        }
    }

    Ok(cov)
}

/// Eigendecomposition of a symmetric matrix via Jacobi iteration.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvalues sorted descending
/// and eigenvectors as matching columns.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::Algorithm(format!(
            "Eigendecomposition requires a square matrix, got {}x{}",
            matrix.nrows(),
            matrix.ncols()
        )));
    }

    let max_iter = 100 * n * n;
    let eps = 1e-12;

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..max_iter {
        // Largest off-diagonal element
        let mut max_val = 0.0;
        let mut p = 0;
        let mut q = 1.min(n.saturating_sub(1));
        for i in 0..n {
            for j in (i + 1)..n {
                if a[(i, j)].abs() > max_val {
                    max_val = a[(i, j)].abs();
                    p = i;
                    q = j;
                }
            }
        }

        if max_val < eps {
            break;
        }

        let theta = if (a[(p, p)] - a[(q, q)]).abs() < eps {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * a[(p, q)] / (a[(p, p)] - a[(q, q)])).atan()
        };

        let cos_t = theta.cos();
        let sin_t = theta.sin();

        let mut new_a = a.clone();
        for i in 0..n {
            if i != p && i != q {
                new_a[(i, p)] = cos_t * a[(i, p)] + sin_t * a[(i, q)];
                new_a[(p, i)] = new_a[(i, p)];
                new_a[(i, q)] = -sin_t * a[(i, p)] + cos_t * a[(i, q)];
                new_a[(q, i)] = new_a[(i, q)];
            }
        }
        new_a[(p, p)] = cos_t * cos_t * a[(p, p)]
            + 2.0 * sin_t * cos_t * a[(p, q)]
            + sin_t * sin_t * a[(q, q)];
        new_a[(q, q)] = sin_t * sin_t * a[(p, p)]
            - 2.0 * sin_t * cos_t * a[(p, q)]
            + cos_t * cos_t * a[(q, q)];
        new_a[(p, q)] = 0.0;
        new_a[(q, p)] = 0.0;
        a = new_a;

        for i in 0..n {
            let vip = v[(i, p)];
            let viq = v[(i, q)];
            v[(i, p)] = cos_t * vip + sin_t * viq;
            v[(i, q)] = -sin_t * vip + cos_t * viq;
        }
    }

    // Sort descending, permuting eigenvector columns to match
    let raw: Vec<f64> = (0..n).map(|i| a[(i, i)]).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| raw[j].partial_cmp(&raw[i]).unwrap_or(std::cmp::Ordering::Equal));

    let eigenvalues = Array1::from_iter(order.iter().map(|&i| raw[i]));
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        for r in 0..n {
            eigenvectors[(r, dst)] = v[(r, src)];
        }
    }

    Ok((eigenvalues, eigenvectors))
}
