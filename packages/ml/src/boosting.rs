//! `AdaBoost` (SAMME with decision stumps) and log-loss gradient boosting.

use ndarray::ArrayView1;
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::tree::{Criterion, DecisionTree, Node, TreeParams};
use crate::{Classifier, ModelError};

/// Depth of the regression trees in gradient boosting.
pub const GRADIENT_TREE_DEPTH: usize = 3;

/// Newton-step denominators below this produce a zero leaf update.
const MIN_HESSIAN: f64 = 1e-12;

/// Probability clamp used for the initial log-odds.
const PRIOR_EPSILON: f64 = 1e-6;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Weighted vote of depth-one trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoost {
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
}

impl AdaBoost {
    /// Fits up to `n_estimators` stumps with the discrete SAMME update.
    ///
    /// Boosting stops early once a stump is perfect (it is kept with weight
    /// one) or no better than chance.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::BoostingFailed`] when the very first stump is no
    /// better than chance, plus the usual empty-input and hyperparameter
    /// errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(
        data: &Dataset,
        n_estimators: usize,
        learning_rate: f64,
        seed: u64,
    ) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n_estimators == 0 || learning_rate <= 0.0 {
            return Err(ModelError::InvalidHyperparameter {
                message: format!(
                    "AdaBoost needs n_estimators >= 1 and learning_rate > 0 (got {n_estimators}, {learning_rate})"
                ),
            });
        }

        let params = TreeParams {
            criterion: Criterion::Gini,
            max_depth: Some(1),
            min_samples_split: 2,
            max_features: None,
        };
        let targets = data.targets();
        let n = data.len();
        let mut weights = vec![1.0 / n as f64; n];
        let mut rng = StdRng::seed_from_u64(seed);
        let mut stumps = Vec::new();
        let mut alphas = Vec::new();

        for round in 0..n_estimators {
            let stump = DecisionTree::fit(data.x.view(), &targets, &weights, params, &mut rng);
            let missed: Vec<bool> = (0..n)
                .map(|i| (stump.predict_row(data.row(i)) >= 0.5) != data.y[i])
                .collect();
            let total: f64 = weights.iter().sum();
            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|(_, miss)| **miss)
                .map(|(w, _)| w)
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                stumps.push(stump);
                alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                if stumps.is_empty() {
                    return Err(ModelError::BoostingFailed);
                }
                log::debug!("AdaBoost stopped at round {round}: error {error:.4}");
                break;
            }

            let alpha = learning_rate * ((1.0 - error) / error).ln();
            for (w, miss) in weights.iter_mut().zip(&missed) {
                if *miss {
                    *w *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            for w in &mut weights {
                *w /= total;
            }

            stumps.push(stump);
            alphas.push(alpha);
        }

        Ok(Self { stumps, alphas })
    }

    /// Number of stumps kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stumps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stumps.is_empty()
    }
}

impl Classifier for AdaBoost {
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.alphas.iter().sum();
        if total <= 0.0 {
            return 0.5;
        }
        let vote: f64 = self
            .stumps
            .iter()
            .zip(&self.alphas)
            .map(|(stump, alpha)| {
                if stump.predict_row(row) >= 0.5 {
                    *alpha
                } else {
                    -alpha
                }
            })
            .sum();
        sigmoid(vote / total)
    }
}

/// Additive log-odds model built from depth-3 regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoost {
    initial_log_odds: f64,
    learning_rate: f64,
    trees: Vec<DecisionTree>,
}

impl GradientBoost {
    /// Fits `n_estimators` rounds of log-loss boosting.
    ///
    /// Each round fits a squared-error tree to the residuals `y - p` and then
    /// replaces every leaf value with the Newton step
    /// `sum(r) / sum(p * (1 - p))` over the samples in that leaf.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingSet`] or
    /// [`ModelError::InvalidHyperparameter`].
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(
        data: &Dataset,
        n_estimators: usize,
        learning_rate: f64,
        seed: u64,
    ) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n_estimators == 0 || learning_rate <= 0.0 {
            return Err(ModelError::InvalidHyperparameter {
                message: format!(
                    "Gradient boosting needs n_estimators >= 1 and learning_rate > 0 (got {n_estimators}, {learning_rate})"
                ),
            });
        }

        let n = data.len();
        let targets = data.targets();
        let prior = (targets.iter().sum::<f64>() / n as f64).clamp(PRIOR_EPSILON, 1.0 - PRIOR_EPSILON);
        let initial_log_odds = (prior / (1.0 - prior)).ln();

        let params = TreeParams {
            criterion: Criterion::Mse,
            max_depth: Some(GRADIENT_TREE_DEPTH),
            min_samples_split: 2,
            max_features: None,
        };
        let ones = vec![1.0; n];
        let mut rng = StdRng::seed_from_u64(seed);
        let mut raw = vec![initial_log_odds; n];
        let mut trees = Vec::with_capacity(n_estimators);

        for _ in 0..n_estimators {
            let probabilities: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&probabilities)
                .map(|(y, p)| y - p)
                .collect();

            let mut tree = DecisionTree::fit(data.x.view(), &residuals, &ones, params, &mut rng);

            let leaves: Vec<usize> = (0..n).map(|i| tree.leaf_index(data.row(i))).collect();
            let mut numerators = vec![0.0; tree.nodes().len()];
            let mut denominators = vec![0.0; tree.nodes().len()];
            for (i, &leaf) in leaves.iter().enumerate() {
                numerators[leaf] += residuals[i];
                denominators[leaf] += probabilities[i] * (1.0 - probabilities[i]);
            }
            let leaf_ids: Vec<usize> = tree
                .nodes()
                .iter()
                .enumerate()
                .filter(|(_, node)| matches!(node, Node::Leaf { .. }))
                .map(|(id, _)| id)
                .collect();
            for leaf in leaf_ids {
                let gamma = if denominators[leaf].abs() < MIN_HESSIAN {
                    0.0
                } else {
                    numerators[leaf] / denominators[leaf]
                };
                tree.set_leaf_value(leaf, gamma);
            }

            for (i, &leaf) in leaves.iter().enumerate() {
                if let Node::Leaf { value, .. } = tree.nodes()[leaf] {
                    raw[i] += learning_rate * value;
                }
            }
            trees.push(tree);
        }

        Ok(Self {
            initial_log_odds,
            learning_rate,
            trees,
        })
    }

    /// Raw log-odds score for a row.
    #[must_use]
    pub fn decision_function(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.initial_log_odds
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict_row(row))
                .sum::<f64>()
    }
}

impl Classifier for GradientBoost {
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        sigmoid(self.decision_function(row))
    }
}
