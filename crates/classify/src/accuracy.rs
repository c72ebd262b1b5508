//! Classification accuracy assessment
//!
//! Confusion matrix over (predicted, reference) label pairs with overall
//! accuracy and Cohen's kappa. The matrix is square with one row/column per
//! label value up to the largest reference label, so non-contiguous label
//! sets leave empty rows rather than remapping indices.

use mapcover_core::{Error, Result};
use ndarray::{Array2, Axis};

/// Confusion matrix and summary scores for one prediction run
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    matrix: Array2<u64>,
    overall_accuracy: f64,
    kappa: f64,
}

impl ConfusionMatrix {
    /// Build the matrix from predicted and reference labels.
    ///
    /// Cell (i, j) counts pixels predicted as label i+1 with reference
    /// label j+1. Labels must be positive; 0 is background and never
    /// enters an assessment.
    pub fn compute(predicted: &[u8], reference: &[u8]) -> Result<Self> {
        if predicted.len() != reference.len() {
            return Err(Error::DimensionMismatch {
                expected: reference.len(),
                actual: predicted.len(),
            });
        }
        if reference.is_empty() {
            return Err(Error::InvalidParameter {
                name: "reference",
                value: "empty".into(),
                reason: "accuracy assessment needs at least one pair".into(),
            });
        }
        if predicted.iter().chain(reference.iter()).any(|&l| l == 0) {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: "0".into(),
                reason: "background label 0 cannot enter a confusion matrix".into(),
            });
        }

        let size = predicted
            .iter()
            .chain(reference.iter())
            .copied()
            .max()
            .unwrap() as usize;
        let mut matrix = Array2::<u64>::zeros((size, size));
        for (&yp, &yr) in predicted.iter().zip(reference.iter()) {
            matrix[(yp as usize - 1, yr as usize - 1)] += 1;
        }

        let n = predicted.len() as f64;
        let diagonal: u64 = (0..size).map(|i| matrix[(i, i)]).sum();
        let overall_accuracy = diagonal as f64 / n;

        // Kappa compares observed agreement with the agreement expected
        // from the row/column marginals alone
        let by_row = matrix.sum_axis(Axis(1));
        let by_col = matrix.sum_axis(Axis(0));
        let chance: f64 = by_row
            .iter()
            .zip(by_col.iter())
            .map(|(&r, &c)| r as f64 * c as f64)
            .sum();
        let kappa = if (n * n - chance).abs() < f64::EPSILON {
            1.0
        } else {
            (n * n * overall_accuracy - chance) / (n * n - chance)
        };

        Ok(Self {
            matrix,
            overall_accuracy,
            kappa,
        })
    }

    /// Count matrix, predicted labels on rows, reference labels on columns
    pub fn matrix(&self) -> &Array2<u64> {
        &self.matrix
    }

    /// Fraction of pairs where predicted equals reference
    pub fn overall_accuracy(&self) -> f64 {
        self.overall_accuracy
    }

    /// Cohen's kappa, chance-corrected agreement
    pub fn kappa(&self) -> f64 {
        self.kappa
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "confusion matrix (rows: predicted, cols: reference)")?;
        for row in self.matrix.outer_iter() {
            for v in row.iter() {
                write!(f, "{:>8}", v)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "overall accuracy: {:.4}", self.overall_accuracy)?;
        write!(f, "kappa: {:.4}", self.kappa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_agreement() {
        let labels = vec![1u8, 2, 3, 1, 2, 3];
        let cm = ConfusionMatrix::compute(&labels, &labels).unwrap();
        assert_relative_eq!(cm.overall_accuracy(), 1.0);
        assert_relative_eq!(cm.kappa(), 1.0);
        assert_eq!(cm.matrix()[(0, 0)], 2);
        assert_eq!(cm.matrix()[(2, 2)], 2);
        assert_eq!(cm.matrix()[(0, 1)], 0);
    }

    #[test]
    fn test_counts_and_scores() {
        // 2-class case with known marginals
        let predicted = vec![1u8, 1, 2, 2, 1, 2];
        let reference = vec![1u8, 1, 2, 2, 2, 1];
        let cm = ConfusionMatrix::compute(&predicted, &reference).unwrap();

        assert_eq!(cm.matrix()[(0, 0)], 2);
        assert_eq!(cm.matrix()[(0, 1)], 1);
        assert_eq!(cm.matrix()[(1, 0)], 1);
        assert_eq!(cm.matrix()[(1, 1)], 2);

        assert_relative_eq!(cm.overall_accuracy(), 4.0 / 6.0);
        // n^2 = 36, chance = 3*3 + 3*3 = 18, kappa = (24 - 18) / (36 - 18)
        assert_relative_eq!(cm.kappa(), 6.0 / 18.0);
    }

    #[test]
    fn test_non_contiguous_labels_keep_empty_rows() {
        let predicted = vec![1u8, 4];
        let reference = vec![1u8, 4];
        let cm = ConfusionMatrix::compute(&predicted, &reference).unwrap();
        assert_eq!(cm.matrix().dim(), (4, 4));
        assert_eq!(cm.matrix()[(3, 3)], 1);
        assert_eq!(cm.matrix()[(1, 1)], 0);
        assert_relative_eq!(cm.overall_accuracy(), 1.0);
    }

    #[test]
    fn test_background_label_rejected() {
        assert!(ConfusionMatrix::compute(&[0u8, 1], &[1u8, 1]).is_err());
        assert!(ConfusionMatrix::compute(&[1u8, 1], &[0u8, 1]).is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            ConfusionMatrix::compute(&[1u8, 2], &[1u8]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(ConfusionMatrix::compute(&[], &[]).is_err());
    }
}
