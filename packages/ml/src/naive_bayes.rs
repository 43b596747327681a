//! Gaussian naive Bayes.

use std::f64::consts::PI;

use ndarray::{Array1, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::{Classifier, ModelError};

/// Portion of the largest feature variance added to every variance.
pub const VAR_SMOOTHING: f64 = 1e-9;

/// Per-class Gaussian likelihoods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    mean: Array1<f64>,
    var: Array1<f64>,
}

impl ClassStats {
    fn joint_log_likelihood(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut ll = self.log_prior;
        for ((x, mean), var) in row.iter().zip(&self.mean).zip(&self.var) {
            ll -= 0.5 * ((2.0 * PI * var).ln() + (x - mean).powi(2) / var);
        }
        ll
    }
}

/// Gaussian naive Bayes over both label classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNb {
    negative: ClassStats,
    positive: ClassStats,
}

impl GaussianNb {
    /// Fits class priors, means, and variances.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingSet`], or
    /// [`ModelError::SingleClass`] when either label is absent.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(data: &Dataset) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let (negatives, positives) = data.class_counts();
        if negatives == 0 || positives == 0 {
            return Err(ModelError::SingleClass);
        }

        let max_var = data
            .x
            .var_axis(Axis(0), 0.0)
            .iter()
            .copied()
            .fold(0.0, f64::max);
        let epsilon = if max_var > 0.0 {
            VAR_SMOOTHING * max_var
        } else {
            VAR_SMOOTHING
        };

        let stats = |label: bool, count: usize| {
            let rows: Vec<usize> = (0..data.len()).filter(|&i| data.y[i] == label).collect();
            let subset = data.x.select(Axis(0), &rows);
            ClassStats {
                log_prior: (count as f64 / data.len() as f64).ln(),
                mean: subset.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(data.n_features())),
                var: subset.var_axis(Axis(0), 0.0) + epsilon,
            }
        };

        Ok(Self {
            negative: stats(false, negatives),
            positive: stats(true, positives),
        })
    }
}

impl Classifier for GaussianNb {
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let neg = self.negative.joint_log_likelihood(row);
        let pos = self.positive.joint_log_likelihood(row);
        1.0 / (1.0 + (neg - pos).exp())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn separates_gaussian_blobs() {
        let data = Dataset::new(
            array![[0.0, 1.0], [0.5, 1.2], [-0.5, 0.8], [5.0, 3.0], [5.5, 3.1], [4.5, 2.9]],
            vec![false, false, false, true, true, true],
        )
        .unwrap();
        let model = GaussianNb::fit(&data).unwrap();
        assert!(model.predict_proba_row(array![0.2, 1.0].view()) < 0.01);
        assert!(model.predict_proba_row(array![5.2, 3.0].view()) > 0.99);
    }

    #[test]
    fn priors_break_symmetric_ties() {
        let data = Dataset::new(
            array![[0.0], [2.0], [0.0], [2.0], [0.0], [2.0]],
            vec![false, false, false, false, true, true],
        )
        .unwrap();
        let model = GaussianNb::fit(&data).unwrap();
        // Same mean and variance for both classes: only the 4:2 prior differs.
        let p = model.predict_proba_row(array![1.0].view());
        assert!((p - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn single_class_is_rejected() {
        let data = Dataset::new(array![[0.0], [1.0]], vec![true, true]).unwrap();
        assert!(matches!(GaussianNb::fit(&data), Err(ModelError::SingleClass)));
    }
}
