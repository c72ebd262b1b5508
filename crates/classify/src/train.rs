//! End-to-end model training
//!
//! Wires the pieces together: fit the scaling transform, pick the
//! regularization strength by cross-validation, learn the final model on
//! every scaled sample, and pack the result into a persistable bundle.

use crate::bundle::ModelBundle;
use crate::cv::{cross_validate, CrossValidationReport};
use crate::gmm::GmmClassifier;
use crate::scaling::ScalingParams;
use mapcover_core::{Error, Result};
use ndarray::ArrayView2;
use tracing::info;

/// Default regularization grid, 10^-8 through 10^7
pub fn default_tau_grid() -> Vec<f64> {
    (-8..8).map(|e| 10f64.powi(e)).collect()
}

/// Knobs for a training run
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of cross-validation folds
    pub folds: usize,
    /// Candidate regularization values; a single entry skips the
    /// cross-validation and uses that value directly
    pub tau_grid: Vec<f64>,
    /// Fit a per-feature scaling transform before learning
    pub scale: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            tau_grid: default_tau_grid(),
            scale: true,
        }
    }
}

/// A trained bundle plus the cross-validation evidence behind it
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    /// `None` when the grid had a single entry and no search ran
    pub report: Option<CrossValidationReport>,
}

/// Train a classifier on a sample matrix and label vector.
///
/// With scaling disabled the bundle still carries scaling parameters, as
/// an identity transform, so classification never needs to know which
/// variant was used.
pub fn train(
    x: &ArrayView2<f64>,
    y: &[u8],
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    if config.tau_grid.is_empty() {
        return Err(Error::InvalidParameter {
            name: "tau_grid",
            value: "[]".into(),
            reason: "at least one regularization value is required".into(),
        });
    }

    let scaling = if config.scale {
        ScalingParams::fit(x)?
    } else {
        ScalingParams::identity(x.ncols())
    };
    let scaled = scaling.apply(x)?;

    let (tau, report) = if config.tau_grid.len() > 1 {
        let report = cross_validate(&scaled.view(), y, &config.tau_grid, config.folds)?;
        info!(
            best_tau = report.best_tau,
            folds = config.folds,
            "cross-validation selected regularization"
        );
        (report.best_tau, Some(report))
    } else {
        (config.tau_grid[0], None)
    };

    let mut model = GmmClassifier::learn(&scaled.view(), y)?;
    model.set_tau(tau);
    info!(
        classes = model.n_classes(),
        samples = y.len(),
        tau,
        "trained classifier"
    );

    let bundle = ModelBundle::new(&model, &scaling)?;
    Ok(TrainingOutcome { bundle, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn separable_dataset(n_per_class: usize) -> (Array2<f64>, Vec<u8>) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let noise = Uniform::new(-1.0, 1.0);
        let n = n_per_class * 2;
        let mut x = Array2::zeros((n, 2));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let center = if i < n_per_class { 0.0 } else { 10.0 };
            x[(i, 0)] = center + noise.sample(&mut rng);
            x[(i, 1)] = center + noise.sample(&mut rng);
            y.push(if i < n_per_class { 1u8 } else { 2u8 });
        }
        (x, y)
    }

    #[test]
    fn test_train_produces_accurate_bundle() {
        let (x, y) = separable_dataset(30);
        let outcome = train(&x.view(), &y, &TrainingConfig::default()).unwrap();

        let report = outcome.report.expect("grid search ran");
        assert!(report.tau_grid.len() > 1);
        assert!(report.accuracy.iter().any(|&a| a > 95.0));

        let model = outcome.bundle.classifier().unwrap();
        let scaling = outcome.bundle.scaling().unwrap();
        assert_eq!(model.tau(), report.best_tau);

        let scaled = scaling.apply(&x.view()).unwrap();
        let predicted = model.predict(&scaled.view(), None).unwrap();
        let hits = predicted.iter().zip(y.iter()).filter(|(a, b)| a == b).count();
        assert!(hits as f64 / y.len() as f64 > 0.95);
    }

    #[test]
    fn test_single_tau_skips_search() {
        let (x, y) = separable_dataset(10);
        let config = TrainingConfig {
            tau_grid: vec![0.5],
            ..TrainingConfig::default()
        };
        let outcome = train(&x.view(), &y, &config).unwrap();
        assert!(outcome.report.is_none());
        assert_eq!(outcome.bundle.classifier().unwrap().tau(), 0.5);
    }

    #[test]
    fn test_scaling_disabled_uses_identity() {
        let (x, y) = separable_dataset(10);
        let config = TrainingConfig {
            tau_grid: vec![0.1],
            scale: false,
            ..TrainingConfig::default()
        };
        let outcome = train(&x.view(), &y, &config).unwrap();

        let scaling = outcome.bundle.scaling().unwrap();
        let same = scaling.apply(&x.view()).unwrap();
        assert_eq!(same, x);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let (x, y) = separable_dataset(5);
        let config = TrainingConfig {
            tau_grid: vec![],
            ..TrainingConfig::default()
        };
        assert!(train(&x.view(), &y, &config).is_err());
    }
}
