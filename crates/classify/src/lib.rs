//! # MapCover Classify
//!
//! Regularized Gaussian mixture classification for MapCover.
//!
//! The pipeline: extract labelled samples from a band stack, fit a
//! per-feature scaling transform, pick the ridge regularization by
//! stratified cross-validation, learn per-class Gaussians, persist the
//! whole model as a versioned bundle, and apply it block by block to
//! arbitrarily large rasters.

pub mod accuracy;
pub mod bundle;
pub mod cv;
pub mod folds;
pub mod gmm;
pub mod linalg;
pub mod sample;
pub mod scaling;
pub mod stack;
pub mod tiled;
pub mod train;

pub use accuracy::ConfusionMatrix;
pub use bundle::ModelBundle;
pub use cv::{cross_validate, CrossValidationReport};
pub use folds::{Fold, FoldPlan};
pub use gmm::{ClassModel, GmmClassifier};
pub use sample::{extract_samples, split_train_test};
pub use scaling::ScalingParams;
pub use stack::BandStack;
pub use tiled::{classify, ClassifyParams, BACKGROUND_LABEL, DEFAULT_BLOCK_SIZE};
pub use train::{default_tau_grid, train, TrainingConfig, TrainingOutcome};
