//! Persisted model bundle
//!
//! The classifier state and the scaling parameters are only correct
//! together: predictions must see samples scaled with the exact vectors the
//! model was trained on. The bundle therefore persists both as one file,
//! but with independently versioned records so the two formats can evolve
//! without corrupting each other.

use crate::gmm::{ClassModel, GmmClassifier};
use crate::scaling::ScalingParams;
use mapcover_core::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Format version of the class-model list
pub const CLASSIFIER_FORMAT_VERSION: u16 = 1;
/// Format version of the scaling parameters
pub const SCALING_FORMAT_VERSION: u16 = 1;

/// Wire record for one class of the Gaussian model
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassRecord {
    label: u8,
    prior: f64,
    mean: Array1<f64>,
    eigenvalues: Array1<f64>,
    eigenvectors: Array2<f64>,
}

/// Versioned wire record for the classifier state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassifierRecord {
    version: u16,
    tau: f64,
    classes: Vec<ClassRecord>,
}

/// Versioned wire record for the scaling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalingRecord {
    version: u16,
    max: Array1<f64>,
    min: Array1<f64>,
}

/// The persisted unit: classifier state plus the scaling parameters it was
/// trained with. Neither part is usable without the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    classifier: ClassifierRecord,
    scaling: ScalingRecord,
}

impl ModelBundle {
    /// Build a bundle from a fitted classifier and its scaling parameters
    pub fn new(model: &GmmClassifier, scaling: &ScalingParams) -> Result<Self> {
        if model.dim() != scaling.dim() {
            return Err(Error::DimensionMismatch {
                expected: model.dim(),
                actual: scaling.dim(),
            });
        }

        let classes = model
            .classes()
            .iter()
            .map(|class| ClassRecord {
                label: class.label,
                prior: class.prior,
                mean: class.mean.clone(),
                eigenvalues: class.eigenvalues.clone(),
                eigenvectors: class.eigenvectors.clone(),
            })
            .collect();

        Ok(Self {
            classifier: ClassifierRecord {
                version: CLASSIFIER_FORMAT_VERSION,
                tau: model.tau(),
                classes,
            },
            scaling: ScalingRecord {
                version: SCALING_FORMAT_VERSION,
                max: scaling.max().clone(),
                min: scaling.min().clone(),
            },
        })
    }

    /// Feature dimension of the persisted model
    pub fn dim(&self) -> usize {
        self.scaling.max.len()
    }

    /// Reconstruct the classifier from the wire records.
    ///
    /// The class covariance is recomposed from its spectral decomposition
    /// (`Q diag(L) Q^T`); the per-class sample count is not persisted since
    /// prediction never uses it.
    pub fn classifier(&self) -> Result<GmmClassifier> {
        if self.classifier.version != CLASSIFIER_FORMAT_VERSION {
            return Err(Error::ModelLoad(format!(
                "Unsupported classifier format version {}",
                self.classifier.version
            )));
        }

        let classes: Vec<ClassModel> = self
            .classifier
            .classes
            .iter()
            .map(|record| {
                let covariance = record
                    .eigenvectors
                    .dot(&Array2::from_diag(&record.eigenvalues))
                    .dot(&record.eigenvectors.t());
                ClassModel {
                    label: record.label,
                    count: 0,
                    prior: record.prior,
                    mean: record.mean.clone(),
                    covariance,
                    eigenvalues: record.eigenvalues.clone(),
                    eigenvectors: record.eigenvectors.clone(),
                }
            })
            .collect();

        GmmClassifier::from_classes(classes, self.classifier.tau)
    }

    /// Reconstruct the scaling parameters from the wire record
    pub fn scaling(&self) -> Result<ScalingParams> {
        if self.scaling.version != SCALING_FORMAT_VERSION {
            return Err(Error::ModelLoad(format!(
                "Unsupported scaling format version {}",
                self.scaling.version
            )));
        }
        ScalingParams::from_vectors(self.scaling.max.clone(), self.scaling.min.clone())
    }

    /// Validate internal coherence: both records must describe the same
    /// feature dimension, and every class must agree on it.
    pub fn validate(&self) -> Result<()> {
        let d = self.dim();
        if self.scaling.min.len() != d {
            return Err(Error::ModelLoad(format!(
                "Scaling vectors disagree on dimension: max has {}, min has {}",
                d,
                self.scaling.min.len()
            )));
        }
        if self.classifier.classes.is_empty() {
            return Err(Error::ModelLoad("Bundle holds no classes".into()));
        }
        for record in &self.classifier.classes {
            if record.mean.len() != d
                || record.eigenvalues.len() != d
                || record.eigenvectors.dim() != (d, d)
            {
                return Err(Error::ModelLoad(format!(
                    "Class {} disagrees with the bundle dimension {}",
                    record.label, d
                )));
            }
        }
        Ok(())
    }

    /// Save the bundle to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| Error::ModelLoad(format!("Failed to serialize model bundle: {}", e)))?;
        Ok(())
    }

    /// Load and validate a bundle from a file.
    ///
    /// All structural validation happens here, before any raster is opened
    /// or written.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let bundle: ModelBundle =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| {
                    Error::ModelLoad(format!("Failed to deserialize model bundle: {}", e))
                })?;
        bundle.validate()?;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn fitted_bundle() -> (GmmClassifier, ScalingParams, ModelBundle) {
        let x = array![
            [0.0, 0.2],
            [0.3, -0.1],
            [-0.2, 0.1],
            [10.0, 10.2],
            [10.3, 9.9],
            [9.8, 10.1],
        ];
        let y = vec![1u8, 1, 1, 2, 2, 2];

        let scaling = ScalingParams::fit(&x.view()).unwrap();
        let scaled = scaling.apply(&x.view()).unwrap();
        let mut model = GmmClassifier::learn(&scaled.view(), &y).unwrap();
        model.set_tau(0.1);

        let bundle = ModelBundle::new(&model, &scaling).unwrap();
        (model, scaling, bundle)
    }

    #[test]
    fn test_save_load_roundtrip_is_value_identical() {
        let (model, scaling, bundle) = fitted_bundle();

        let tmp = tempfile::NamedTempFile::with_suffix(".model").unwrap();
        bundle.save(tmp.path()).unwrap();
        let loaded = ModelBundle::load(tmp.path()).unwrap();

        let restored_scaling = loaded.scaling().unwrap();
        assert_eq!(restored_scaling, scaling);

        let restored = loaded.classifier().unwrap();
        assert_eq!(restored.tau(), model.tau());
        assert_eq!(restored.n_classes(), model.n_classes());
        for (a, b) in restored.classes().iter().zip(model.classes()) {
            assert_eq!(a.label, b.label);
            assert_relative_eq!(a.prior, b.prior);
            assert_eq!(a.mean, b.mean);
            assert_eq!(a.eigenvalues, b.eigenvalues);
            assert_eq!(a.eigenvectors, b.eigenvectors);
        }
    }

    #[test]
    fn test_restored_model_predicts_identically() {
        let (model, scaling, bundle) = fitted_bundle();
        let x = array![[0.1, 0.1], [9.9, 10.0]];
        let scaled = scaling.apply(&x.view()).unwrap();

        let tmp = tempfile::NamedTempFile::with_suffix(".model").unwrap();
        bundle.save(tmp.path()).unwrap();
        let loaded = ModelBundle::load(tmp.path()).unwrap();

        let restored = loaded.classifier().unwrap();
        let a = model.predict(&scaled.view(), None).unwrap();
        let b = restored.predict(&scaled.view(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = tempfile::NamedTempFile::with_suffix(".model").unwrap();
        std::fs::write(tmp.path(), b"not a model bundle").unwrap();
        assert!(matches!(
            ModelBundle::load(tmp.path()),
            Err(Error::ModelLoad(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected_at_build() {
        let (model, _, _) = fitted_bundle();
        let wrong_scaling = ScalingParams::identity(5);
        assert!(ModelBundle::new(&model, &wrong_scaling).is_err());
    }
}
