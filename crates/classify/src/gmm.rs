//! Regularized Gaussian discriminant classifier
//!
//! One Gaussian per class, with ridge regularization applied to the
//! covariance eigenvalues before inversion. The spectral decomposition is
//! computed once at training time; prediction only re-scales eigenvalues,
//! so sweeping a regularization grid is cheap.

use crate::linalg::{population_covariance, symmetric_eigen};
use mapcover_core::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Per-class parameters of the fitted model.
///
/// Eigenvalues are sorted descending and correspond column-wise to the
/// eigenvector matrix. `label` is the original class label; the position in
/// the classifier's class list is the dense index.
#[derive(Debug, Clone)]
pub struct ClassModel {
    /// Original class label
    pub label: u8,
    /// Number of training samples in this class
    pub count: usize,
    /// Prior proportion (count / n)
    pub prior: f64,
    /// Mean vector (d)
    pub mean: Array1<f64>,
    /// Population covariance matrix (d x d, normalized by count)
    pub covariance: Array2<f64>,
    /// Covariance eigenvalues, descending (d)
    pub eigenvalues: Array1<f64>,
    /// Covariance eigenvectors, columns matching `eigenvalues` (d x d)
    pub eigenvectors: Array2<f64>,
}

/// Gaussian discriminant model with eigenvalue-ridge regularization.
///
/// Immutable once learned; `learn` is a constructor, so no partially
/// updated state is ever observable.
#[derive(Debug, Clone)]
pub struct GmmClassifier {
    classes: Vec<ClassModel>,
    dim: usize,
    tau: f64,
}

impl GmmClassifier {
    /// Learn the model from a sample matrix (n x d) and labels (n).
    ///
    /// Classes are processed in ascending label order; that order defines
    /// the dense class index used everywhere else.
    pub fn learn(x: &ArrayView2<f64>, y: &[u8]) -> Result<Self> {
        let n = x.nrows();
        let d = x.ncols();
        if n == 0 || d == 0 {
            return Err(Error::Algorithm("Cannot learn from an empty sample matrix".into()));
        }
        if y.len() != n {
            return Err(Error::Algorithm(format!(
                "Sample/label count mismatch: {} rows, {} labels",
                n,
                y.len()
            )));
        }
        if y.contains(&0) {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: "0".into(),
                reason: "class labels must be positive; 0 is the background label".into(),
            });
        }

        let mut distinct: Vec<u8> = y.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        let mut classes = Vec::with_capacity(distinct.len());
        for &label in &distinct {
            let indices: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| v == label)
                .map(|(i, _)| i)
                .collect();

            let rows = x.select(Axis(0), &indices);
            let count = indices.len();
            let mean = rows.mean_axis(Axis(0)).expect("class is non-empty");
            let covariance = population_covariance(&rows.view())?;
            let (eigenvalues, eigenvectors) = symmetric_eigen(&covariance)?;

            classes.push(ClassModel {
                label,
                count,
                prior: count as f64 / n as f64,
                mean,
                covariance,
                eigenvalues,
                eigenvectors,
            });
        }

        Ok(Self {
            classes,
            dim: d,
            tau: 0.0,
        })
    }

    /// Rebuild a classifier from persisted class models.
    ///
    /// Validates dimensional coherence; used when loading a model bundle.
    pub fn from_classes(classes: Vec<ClassModel>, tau: f64) -> Result<Self> {
        if classes.is_empty() {
            return Err(Error::ModelLoad("Model holds no classes".into()));
        }
        let dim = classes[0].mean.len();
        for class in &classes {
            if class.mean.len() != dim
                || class.eigenvalues.len() != dim
                || class.eigenvectors.dim() != (dim, dim)
                || class.covariance.dim() != (dim, dim)
            {
                return Err(Error::ModelLoad(format!(
                    "Class {} disagrees on feature dimension {}",
                    class.label, dim
                )));
            }
            if !(class.prior > 0.0 && class.prior <= 1.0) {
                return Err(Error::ModelLoad(format!(
                    "Class {} has invalid prior {}",
                    class.label, class.prior
                )));
            }
        }
        Ok(Self { classes, dim, tau })
    }

    /// Feature dimension the model was trained on
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Per-class models in dense-index order (ascending training label)
    pub fn classes(&self) -> &[ClassModel] {
        &self.classes
    }

    /// Regularization value used when `predict` is called without one
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Set the default regularization value (typically the cross-validated
    /// optimum)
    pub fn set_tau(&mut self, tau: f64) {
        self.tau = tau;
    }

    /// Regularized inverse covariance and log-determinant for one class.
    ///
    /// `Lr = L + tau`, `invCov = Q diag(1/Lr) Q^T`, `logdet = sum(ln Lr)`.
    /// Fails if any regularized eigenvalue is non-positive rather than
    /// taking the log of a non-positive number.
    pub fn regularized_inverse(&self, c: usize, tau: f64) -> Result<(Array2<f64>, f64)> {
        let class = &self.classes[c];
        let lr = &class.eigenvalues + tau;

        for &v in lr.iter() {
            if v <= 0.0 {
                return Err(Error::SingularCovariance {
                    class: class.label,
                    eigenvalue: v,
                });
            }
        }

        // Q * (1/Lr) scales eigenvector columns, then re-projects
        let scaled = &class.eigenvectors / &lr;
        let inv_cov = scaled.dot(&class.eigenvectors.t());
        let logdet = lr.mapv(f64::ln).sum();

        Ok((inv_cov, logdet))
    }

    /// Predict labels for a sample matrix.
    ///
    /// `tau` overrides the stored regularization when given.
    pub fn predict(&self, x: &ArrayView2<f64>, tau: Option<f64>) -> Result<Array1<u8>> {
        self.predict_with_scores(x, tau).map(|(labels, _)| labels)
    }

    /// Predict labels and return the full discriminant score matrix
    /// (n x C). The assigned class minimizes the score; ties go to the
    /// lowest dense class index.
    pub fn predict_with_scores(
        &self,
        x: &ArrayView2<f64>,
        tau: Option<f64>,
    ) -> Result<(Array1<u8>, Array2<f64>)> {
        if x.ncols() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: x.ncols(),
            });
        }

        let tau = tau.unwrap_or(self.tau);
        let n = x.nrows();
        let c_count = self.classes.len();
        let mut scores = Array2::<f64>::zeros((n, c_count));

        for (c, class) in self.classes.iter().enumerate() {
            let (inv_cov, logdet) = self.regularized_inverse(c, tau)?;
            let cst = logdet - 2.0 * class.prior.ln();

            let centered = &x.to_owned() - &class.mean;
            let projected = centered.dot(&inv_cov);
            let quad = (&centered * &projected).sum_axis(Axis(1));

            scores.column_mut(c).assign(&(quad + cst));
        }

        let labels = Array1::from_iter(scores.rows().into_iter().map(|row| {
            let mut best = 0;
            for c in 1..c_count {
                if row[c] < row[best] {
                    best = c;
                }
            }
            self.classes[best].label
        }));

        Ok((labels, scores))
    }

    /// Bayesian Information Criterion of the model on labeled data.
    ///
    /// Penalty `P = [C d(d+3)/2 + (C-1)] ln n` plus the sum of each
    /// sample's discriminant score under its true class. Callers should not
    /// assume a selection direction from the sign alone; cross-validation
    /// accuracy is the arbiter for model choice.
    pub fn bic(&self, x: &ArrayView2<f64>, y: &[u8], tau: Option<f64>) -> Result<f64> {
        if x.ncols() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: x.ncols(),
            });
        }
        if y.len() != x.nrows() {
            return Err(Error::Algorithm(format!(
                "Sample/label count mismatch: {} rows, {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let tau = tau.unwrap_or(self.tau);
        let c_count = self.classes.len() as f64;
        let d = self.dim as f64;
        let n = x.nrows() as f64;

        let penalty = (c_count * (d * (d + 3.0) / 2.0) + (c_count - 1.0)) * n.ln();

        let mut likelihood = 0.0;
        for (c, class) in self.classes.iter().enumerate() {
            let indices: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| v == class.label)
                .map(|(i, _)| i)
                .collect();
            if indices.is_empty() {
                continue;
            }

            let (inv_cov, logdet) = self.regularized_inverse(c, tau)?;
            let cst = logdet - 2.0 * class.prior.ln();

            let rows = x.select(Axis(0), &indices);
            let centered = &rows - &class.mean;
            let projected = centered.dot(&inv_cov);
            let quad = (&centered * &projected).sum_axis(Axis(1));

            likelihood += quad.sum() + cst * indices.len() as f64;
        }

        Ok(likelihood + penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn two_class_data() -> (Array2<f64>, Vec<u8>) {
        // Class 1 clustered near the origin, class 2 near (10, 10)
        let x = array![
            [0.0, 0.2],
            [0.3, -0.1],
            [-0.2, 0.1],
            [0.1, 0.4],
            [10.0, 10.2],
            [10.3, 9.9],
            [9.8, 10.1],
            [10.1, 10.4],
        ];
        let y = vec![1, 1, 1, 1, 2, 2, 2, 2];
        (x, y)
    }

    #[test]
    fn test_learn_single_class() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 9.0]];
        let y = vec![4u8, 4, 4];

        let model = GmmClassifier::learn(&x.view(), &y).unwrap();
        assert_eq!(model.n_classes(), 1);

        let class = &model.classes()[0];
        assert_eq!(class.label, 4);
        assert_eq!(class.count, 3);
        assert_relative_eq!(class.prior, 1.0);

        // Population covariance, cross-checked against the direct formula
        let expected = population_covariance(&x.view()).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(
                    class.covariance[(i, j)],
                    expected[(i, j)],
                    epsilon = 1e-12
                );
            }
        }

        // Spectral invariant: eigenvalues descend
        assert!(class.eigenvalues[0] >= class.eigenvalues[1]);
    }

    #[test]
    fn test_predict_well_separated() {
        let (x, y) = two_class_data();
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();

        let predicted = model.predict(&x.view(), Some(0.0)).unwrap();
        let correct = predicted
            .iter()
            .zip(&y)
            .filter(|(a, b)| a == b)
            .count();
        assert_eq!(correct, y.len(), "training data must be fully separable");
    }

    #[test]
    fn test_labels_mapped_back_to_originals() {
        // Non-contiguous labels: 3 and 7
        let (x, _) = two_class_data();
        let y = vec![3u8, 3, 3, 3, 7, 7, 7, 7];
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();

        let predicted = model.predict(&x.view(), Some(0.1)).unwrap();
        assert!(predicted.iter().all(|&l| l == 3 || l == 7));
        assert_eq!(predicted[0], 3);
        assert_eq!(predicted[7], 7);
    }

    #[test]
    fn test_singular_without_regularization() {
        // A constant feature gives a zero eigenvalue; tau = 0 must fail
        // loudly instead of producing NaN scores
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let y = vec![1u8, 1, 1];
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();

        let err = model.predict(&x.view(), Some(0.0)).unwrap_err();
        assert!(matches!(err, Error::SingularCovariance { .. }));

        // With a positive ridge the same model predicts fine
        assert!(model.predict(&x.view(), Some(0.5)).is_ok());
    }

    #[test]
    fn test_negative_tau_rejected() {
        let (x, y) = two_class_data();
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();
        let err = model.predict(&x.view(), Some(-100.0)).unwrap_err();
        assert!(matches!(err, Error::SingularCovariance { .. }));
    }

    #[test]
    fn test_tie_breaks_to_lowest_dense_index() {
        // Two classes with identical distributions and priors: every score
        // ties, so the first class in ascending-label order must win
        let x = array![[0.0, 1.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]];
        let y = vec![2u8, 2, 5, 5];
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();

        let predicted = model.predict(&x.view(), Some(1.0)).unwrap();
        assert!(predicted.iter().all(|&l| l == 2));
    }

    #[test]
    fn test_background_label_rejected() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let y = vec![0u8, 1];
        assert!(GmmClassifier::learn(&x.view(), &y).is_err());
    }

    #[test]
    fn test_bic_matches_score_sum() {
        let (x, y) = two_class_data();
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();
        let tau = 0.5;

        let (_, scores) = model.predict_with_scores(&x.view(), Some(tau)).unwrap();

        // Likelihood term is the sum of each sample's score under its true
        // class's column
        let mut expected_l = 0.0;
        for (i, &label) in y.iter().enumerate() {
            let c = model
                .classes()
                .iter()
                .position(|cm| cm.label == label)
                .unwrap();
            expected_l += scores[(i, c)];
        }
        let c = model.n_classes() as f64;
        let d = model.dim() as f64;
        let expected_p = (c * (d * (d + 3.0) / 2.0) + (c - 1.0)) * (y.len() as f64).ln();

        let bic = model.bic(&x.view(), &y, Some(tau)).unwrap();
        assert_relative_eq!(bic, expected_l + expected_p, epsilon = 1e-9);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, y) = two_class_data();
        let model = GmmClassifier::learn(&x.view(), &y).unwrap();
        let wrong = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            model.predict(&wrong.view(), None),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
