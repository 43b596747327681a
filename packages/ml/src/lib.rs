#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Arrest-risk model training.
//!
//! Everything operates on a [`dataset::Dataset`] of encoded feature rows:
//!
//! - [`smote`] balances the training split,
//! - [`model`] describes the five classifier families and their grids,
//! - [`search`] runs stratified k-fold grid search (parallel over
//!   candidates with `rayon`),
//! - [`metrics`] scores hold-out predictions, and
//! - [`explain`] computes random-forest importances and SHAP values.
//!
//! All randomness flows from explicit `u64` seeds, so a run is reproducible.

pub mod boosting;
pub mod dataset;
pub mod explain;
pub mod forest;
pub mod knn;
pub mod metrics;
pub mod model;
pub mod naive_bayes;
pub mod progress;
pub mod search;
pub mod smote;
pub mod tree;

use ndarray::{ArrayView1, ArrayView2};

pub use dataset::{Dataset, build_dataset};
pub use model::{FittedModel, Hyperparams, ModelFamily, ModelKind, default_families};
pub use smote::ResampleError;

/// Errors that can occur while fitting or explaining models.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// No rows to fit on.
    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// The model needs both labels present.
    #[error("Training set contains a single class")]
    SingleClass,

    /// A hyperparameter is out of range for the data.
    #[error("Invalid hyperparameter: {message}")]
    InvalidHyperparameter {
        /// What was wrong.
        message: String,
    },

    /// Not enough rows to build the requested folds.
    #[error("{samples} samples cannot be split into {folds} folds")]
    TooFewSamples {
        /// Rows available.
        samples: usize,
        /// Folds requested.
        folds: usize,
    },

    /// The first boosting round was no better than chance.
    #[error("Boosting failed: first estimator is no better than chance")]
    BoostingFailed,

    /// Input shapes do not line up.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong.
        message: String,
    },
}

/// A binary classifier producing positive-class probabilities.
pub trait Classifier: Send + Sync {
    /// Probability that a row belongs to the positive class.
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64;

    /// Positive-class probability for every row.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba_row(row))
            .collect()
    }

    /// Hard predictions at a 0.5 threshold.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<bool> {
        self.predict_proba(x).into_iter().map(|p| p >= 0.5).collect()
    }
}
