//! Bootstrap-aggregated random forest classifier.

use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::tree::{Criterion, DecisionTree, TreeParams};
use crate::{Classifier, ModelError};

/// An ensemble of Gini trees grown on bootstrap samples with `sqrt(p)`
/// features considered per split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fits `n_trees` trees. Tree `i` is seeded with `seed + i`, so the
    /// result does not depend on how `rayon` schedules the work.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingSet`] for an empty dataset and
    /// [`ModelError::InvalidHyperparameter`] when `n_trees` is zero.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn fit(
        data: &Dataset,
        n_trees: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        seed: u64,
    ) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n_trees == 0 {
            return Err(ModelError::InvalidHyperparameter {
                message: "n_estimators must be at least 1".to_string(),
            });
        }

        let n = data.len();
        let n_features = data.n_features();
        let params = TreeParams {
            criterion: Criterion::Gini,
            max_depth,
            min_samples_split,
            max_features: Some(((n_features as f64).sqrt() as usize).max(1)),
        };
        let targets = data.targets();

        let trees = (0..n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let mut counts = vec![0.0; n];
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1.0;
                }
                DecisionTree::fit(data.x.view(), &targets, &counts, params, &mut rng)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean of the per-tree normalised impurity importances, renormalised to
    /// sum to one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, value) in mean.iter_mut().zip(tree.feature_importances()) {
                *acc += value;
            }
        }
        let total: f64 = mean.iter().sum();
        if total > 0.0 {
            for value in &mut mean {
                *value /= total;
            }
        }
        mean
    }
}

impl Classifier for RandomForest {
    #[allow(clippy::cast_precision_loss)]
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn separable(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => (i % 24) as f64,
            1 => (i % 3) as f64,
            _ => (i % 2) as f64,
        });
        let y = (0..n).map(|i| i % 24 >= 18).collect();
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn learns_separable_rule() {
        let data = separable(240);
        let forest = RandomForest::fit(&data, 25, Some(10), 2, 42).unwrap();
        let predictions = forest.predict(data.x.view());
        let correct = predictions
            .iter()
            .zip(&data.y)
            .filter(|(p, y)| p == y)
            .count();
        assert!(correct >= 235, "only {correct} correct");
    }

    #[test]
    fn importances_sum_to_one_and_favour_signal() {
        let forest = RandomForest::fit(&separable(240), 25, Some(10), 2, 42).unwrap();
        let importances = forest.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
        assert!(importances[0] > importances[2]);
    }

    #[test]
    fn same_seed_same_forest() {
        let data = separable(120);
        let a = RandomForest::fit(&data, 10, Some(5), 2, 7).unwrap();
        let b = RandomForest::fit(&data, 10, Some(5), 2, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_zero_trees() {
        assert!(RandomForest::fit(&separable(10), 0, None, 2, 0).is_err());
    }
}
