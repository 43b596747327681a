//! Exact SHAP values for tree ensembles.
//!
//! With only a handful of features every coalition can be enumerated, so the
//! attributions are the exact Shapley values of the path-dependent tree
//! expectation (the same value function tree SHAP uses), with no sampling.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::ModelError;
use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// Coalition enumeration is exponential; refuse anything larger.
pub const MAX_EXACT_FEATURES: usize = 16;

/// Per-row attributions for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapValues {
    /// Expected model output with no features known.
    pub base_value: f64,
    /// One row per explained sample, one column per feature.
    pub values: Array2<f64>,
}

impl ShapValues {
    /// Mean absolute attribution per feature.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_abs(&self) -> Vec<f64> {
        let rows = self.values.nrows().max(1) as f64;
        self.values
            .columns()
            .into_iter()
            .map(|column| column.iter().map(|v| v.abs()).sum::<f64>() / rows)
            .collect()
    }
}

/// Shapley weight `|S|! (n - |S| - 1)! / n!` indexed by `|S|`.
#[allow(clippy::cast_precision_loss)]
fn coalition_weights(n: usize) -> Vec<f64> {
    let factorial = |k: usize| (1..=k).map(|i| i as f64).product::<f64>();
    let n_fact = factorial(n);
    (0..n)
        .map(|size| factorial(size) * factorial(n - size - 1) / n_fact)
        .collect()
}

/// Exact Shapley values of one tree for one row.
fn tree_row_shap(
    tree: &DecisionTree,
    row: ArrayView1<'_, f64>,
    n_features: usize,
    weights: &[f64],
) -> Vec<f64> {
    let coalitions = 1_u32 << n_features;
    let values: Vec<f64> = (0..coalitions)
        .map(|mask| tree.conditional_expectation(row, mask))
        .collect();

    let mut phi = vec![0.0; n_features];
    for (feature, slot) in phi.iter_mut().enumerate() {
        let bit = 1_u32 << feature;
        for mask in (0..coalitions).filter(|m| m & bit == 0) {
            let size = mask.count_ones() as usize;
            *slot += weights[size] * (values[(mask | bit) as usize] - values[mask as usize]);
        }
    }
    phi
}

/// SHAP values of a random forest's positive-class probability.
///
/// The forest output is the mean of its trees, so attributions are the mean
/// of per-tree attributions. For every row, `base_value + sum(values)` equals
/// the forest's predicted probability.
///
/// # Errors
///
/// Returns [`ModelError::InvalidInput`] when there are more than
/// [`MAX_EXACT_FEATURES`] features.
#[allow(clippy::cast_precision_loss)]
pub fn forest_shap(forest: &RandomForest, x: ArrayView2<'_, f64>) -> Result<ShapValues, ModelError> {
    let n_features = x.ncols();
    if n_features > MAX_EXACT_FEATURES {
        return Err(ModelError::InvalidInput {
            message: format!(
                "exact SHAP supports at most {MAX_EXACT_FEATURES} features, got {n_features}"
            ),
        });
    }

    let trees = forest.trees();
    let n_trees = trees.len().max(1) as f64;
    let weights = coalition_weights(n_features);

    let base_value = trees.iter().map(DecisionTree::expected_value).sum::<f64>() / n_trees;

    let rows: Vec<Vec<f64>> = x
        .rows()
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|row| {
            let mut phi = vec![0.0; n_features];
            for tree in trees {
                for (acc, v) in phi.iter_mut().zip(tree_row_shap(tree, row, n_features, &weights)) {
                    *acc += v;
                }
            }
            phi.iter().map(|v| v / n_trees).collect()
        })
        .collect();

    let mut values = Array2::zeros((rows.len(), n_features));
    for (mut target, phi) in values.rows_mut().into_iter().zip(rows) {
        for (cell, v) in target.iter_mut().zip(phi) {
            *cell = v;
        }
    }

    Ok(ShapValues { base_value, values })
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::Classifier;
    use crate::dataset::Dataset;

    fn data() -> Dataset {
        let x = Array2::from_shape_fn((120, 3), |(i, j)| match j {
            0 => (i % 24) as f64,
            1 => ((i * 7) % 5) as f64,
            _ => (i % 2) as f64,
        });
        let y = (0..120)
            .map(|i| i % 24 >= 18 || ((i * 7) % 5 == 0 && i % 2 == 1))
            .collect();
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn local_accuracy_holds_for_every_row() {
        let data = data();
        let forest = RandomForest::fit(&data, 15, Some(6), 2, 42).unwrap();
        let shap = forest_shap(&forest, data.x.view()).unwrap();
        assert_eq!(shap.values.dim(), (120, 3));

        for i in 0..data.len() {
            let explained = shap.base_value + shap.values.row(i).sum();
            let predicted = forest.predict_proba_row(data.row(i));
            assert!(
                (explained - predicted).abs() < 1e-9,
                "row {i}: {explained} vs {predicted}"
            );
        }
    }

    #[test]
    fn unused_feature_gets_zero_attribution() {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| if j == 0 { (i % 6) as f64 } else { 1.0 });
        let y = (0..60).map(|i| i % 6 >= 3).collect();
        let data = Dataset::new(x, y).unwrap();
        let forest = RandomForest::fit(&data, 5, Some(4), 2, 1).unwrap();
        let shap = forest_shap(&forest, data.x.view()).unwrap();
        let mean_abs = shap.mean_abs();
        assert!(mean_abs[1].abs() < 1e-12);
        assert!(mean_abs[0] > 0.1);
    }

    #[test]
    fn shapley_weights_sum_over_subsets_to_one() {
        // Sum over |S| of C(n-1, |S|) * weight(|S|) is 1.
        let weights = coalition_weights(5);
        let binomial = [1.0, 4.0, 6.0, 4.0, 1.0];
        let total: f64 = weights.iter().zip(binomial).map(|(w, c)| w * c).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
