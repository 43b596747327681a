//! Model families, hyperparameter grids, and fitted models.

use std::fmt;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::boosting::{AdaBoost, GradientBoost};
use crate::dataset::Dataset;
use crate::forest::RandomForest;
use crate::knn::{Knn, Weighting};
use crate::naive_bayes::GaussianNb;
use crate::{Classifier, ModelError};

/// The classifier families compared by the pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    #[strum(serialize = "adaboost")]
    #[serde(rename = "adaboost")]
    AdaBoost,
    GradientBoost,
    Knn,
    NaiveBayes,
}

impl ModelKind {
    /// Human-readable name used in logs and chart labels.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::RandomForest => "Random Forest",
            Self::AdaBoost => "AdaBoost",
            Self::GradientBoost => "Gradient Boost",
            Self::Knn => "KNN",
            Self::NaiveBayes => "Naive Bayes",
        }
    }

    /// Lowercase, underscore-separated name used in output file names.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        self.into()
    }
}

/// One concrete hyperparameter combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hyperparams {
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
    },
    #[serde(rename = "adaboost")]
    AdaBoost {
        n_estimators: usize,
        learning_rate: f64,
    },
    GradientBoost {
        n_estimators: usize,
        learning_rate: f64,
    },
    Knn {
        n_neighbors: usize,
        weights: Weighting,
    },
    NaiveBayes,
}

impl Hyperparams {
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest { .. } => ModelKind::RandomForest,
            Self::AdaBoost { .. } => ModelKind::AdaBoost,
            Self::GradientBoost { .. } => ModelKind::GradientBoost,
            Self::Knn { .. } => ModelKind::Knn,
            Self::NaiveBayes => ModelKind::NaiveBayes,
        }
    }

    /// Fits a model with these hyperparameters.
    ///
    /// # Errors
    ///
    /// Propagates the family's fit error.
    pub fn fit(&self, data: &Dataset, seed: u64) -> Result<FittedModel, ModelError> {
        Ok(match *self {
            Self::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
            } => FittedModel::RandomForest(RandomForest::fit(
                data,
                n_estimators,
                max_depth,
                min_samples_split,
                seed,
            )?),
            Self::AdaBoost {
                n_estimators,
                learning_rate,
            } => FittedModel::AdaBoost(AdaBoost::fit(data, n_estimators, learning_rate, seed)?),
            Self::GradientBoost {
                n_estimators,
                learning_rate,
            } => FittedModel::GradientBoost(GradientBoost::fit(
                data,
                n_estimators,
                learning_rate,
                seed,
            )?),
            Self::Knn {
                n_neighbors,
                weights,
            } => FittedModel::Knn(Knn::fit(data, n_neighbors, weights)?),
            Self::NaiveBayes => FittedModel::NaiveBayes(GaussianNb::fit(data)?),
        })
    }
}

impl fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
            } => {
                let depth = max_depth.map_or_else(|| "None".to_string(), |d| d.to_string());
                write!(
                    f,
                    "max_depth={depth}, min_samples_split={min_samples_split}, n_estimators={n_estimators}"
                )
            }
            Self::AdaBoost {
                n_estimators,
                learning_rate,
            }
            | Self::GradientBoost {
                n_estimators,
                learning_rate,
            } => write!(
                f,
                "learning_rate={learning_rate}, n_estimators={n_estimators}"
            ),
            Self::Knn {
                n_neighbors,
                weights,
            } => write!(f, "n_neighbors={n_neighbors}, weights={weights}"),
            Self::NaiveBayes => f.write_str("defaults"),
        }
    }
}

/// A fitted classifier of any family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedModel {
    RandomForest(RandomForest),
    #[serde(rename = "adaboost")]
    AdaBoost(AdaBoost),
    GradientBoost(GradientBoost),
    Knn(Knn),
    NaiveBayes(GaussianNb),
}

impl FittedModel {
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::RandomForest(_) => ModelKind::RandomForest,
            Self::AdaBoost(_) => ModelKind::AdaBoost,
            Self::GradientBoost(_) => ModelKind::GradientBoost,
            Self::Knn(_) => ModelKind::Knn,
            Self::NaiveBayes(_) => ModelKind::NaiveBayes,
        }
    }

    /// Impurity-based importances, for models that have them.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Self::RandomForest(forest) => Some(forest.feature_importances()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_random_forest(&self) -> Option<&RandomForest> {
        match self {
            Self::RandomForest(forest) => Some(forest),
            _ => None,
        }
    }
}

impl Classifier for FittedModel {
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self {
            Self::RandomForest(m) => m.predict_proba_row(row),
            Self::AdaBoost(m) => m.predict_proba_row(row),
            Self::GradientBoost(m) => m.predict_proba_row(row),
            Self::Knn(m) => m.predict_proba_row(row),
            Self::NaiveBayes(m) => m.predict_proba_row(row),
        }
    }
}

/// A model family with its default settings and optional search grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFamily {
    pub kind: ModelKind,
    pub default: Hyperparams,
    /// `None` means the family is trained with its defaults only.
    pub grid: Option<Vec<Hyperparams>>,
}

impl ModelFamily {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    /// Candidates to evaluate: the grid, or just the defaults.
    #[must_use]
    pub fn candidates(&self) -> Vec<Hyperparams> {
        self.grid
            .clone()
            .unwrap_or_else(|| vec![self.default])
    }
}

/// The five families with their search grids.
///
/// Grids enumerate parameter names in alphabetical order with the last name
/// varying fastest.
#[must_use]
pub fn default_families() -> Vec<ModelFamily> {
    let mut forest = Vec::new();
    for max_depth in [10, 20] {
        for min_samples_split in [2, 5] {
            for n_estimators in [100, 200] {
                forest.push(Hyperparams::RandomForest {
                    n_estimators,
                    max_depth: Some(max_depth),
                    min_samples_split,
                });
            }
        }
    }

    let mut adaboost = Vec::new();
    let mut gradient = Vec::new();
    for learning_rate in [0.1, 1.0] {
        for n_estimators in [50, 100] {
            adaboost.push(Hyperparams::AdaBoost {
                n_estimators,
                learning_rate,
            });
        }
    }
    for learning_rate in [0.1, 0.5] {
        for n_estimators in [100, 200] {
            gradient.push(Hyperparams::GradientBoost {
                n_estimators,
                learning_rate,
            });
        }
    }

    let mut knn = Vec::new();
    for n_neighbors in [3, 5, 7] {
        for weights in [Weighting::Uniform, Weighting::Distance] {
            knn.push(Hyperparams::Knn {
                n_neighbors,
                weights,
            });
        }
    }

    vec![
        ModelFamily {
            kind: ModelKind::RandomForest,
            default: Hyperparams::RandomForest {
                n_estimators: 100,
                max_depth: None,
                min_samples_split: 2,
            },
            grid: Some(forest),
        },
        ModelFamily {
            kind: ModelKind::AdaBoost,
            default: Hyperparams::AdaBoost {
                n_estimators: 50,
                learning_rate: 1.0,
            },
            grid: Some(adaboost),
        },
        ModelFamily {
            kind: ModelKind::GradientBoost,
            default: Hyperparams::GradientBoost {
                n_estimators: 100,
                learning_rate: 0.1,
            },
            grid: Some(gradient),
        },
        ModelFamily {
            kind: ModelKind::Knn,
            default: Hyperparams::Knn {
                n_neighbors: 5,
                weights: Weighting::Uniform,
            },
            grid: Some(knn),
        },
        ModelFamily {
            kind: ModelKind::NaiveBayes,
            default: Hyperparams::NaiveBayes,
            grid: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test]
    fn file_stems_are_lowercase_underscored() {
        let stems: Vec<&str> = ModelKind::iter().map(ModelKind::file_stem).collect();
        assert_eq!(
            stems,
            vec!["random_forest", "adaboost", "gradient_boost", "knn", "naive_bayes"]
        );
    }

    #[test]
    fn grids_have_expected_sizes_and_order() {
        let families = default_families();
        let sizes: Vec<usize> = families.iter().map(|f| f.candidates().len()).collect();
        assert_eq!(sizes, vec![8, 4, 4, 6, 1]);

        let forest = families[0].candidates();
        assert_eq!(
            forest[0],
            Hyperparams::RandomForest {
                n_estimators: 100,
                max_depth: Some(10),
                min_samples_split: 2
            }
        );
        assert_eq!(
            forest[1],
            Hyperparams::RandomForest {
                n_estimators: 200,
                max_depth: Some(10),
                min_samples_split: 2
            }
        );

        let knn = families[3].candidates();
        assert_eq!(
            knn[1],
            Hyperparams::Knn {
                n_neighbors: 3,
                weights: Weighting::Distance
            }
        );
    }

    #[test]
    fn every_candidate_matches_its_family() {
        for family in default_families() {
            assert!(family.candidates().iter().all(|c| c.kind() == family.kind));
            assert_eq!(family.default.kind(), family.kind);
        }
    }

    #[test]
    fn fitted_model_survives_messagepack() {
        use ndarray::Array2;

        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i + j) % 7) as f64);
        let y = (0..30).map(|i| i % 7 >= 4).collect();
        let data = Dataset::new(x, y).unwrap();
        let params = Hyperparams::GradientBoost {
            n_estimators: 5,
            learning_rate: 0.5,
        };
        let model = params.fit(&data, 3).unwrap();

        let bytes = rmp_serde::to_vec_named(&model).unwrap();
        let restored: FittedModel = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(restored, model);
        assert_eq!(
            restored.predict_proba(data.x.view()),
            model.predict_proba(data.x.view())
        );
    }

    #[test]
    fn hyperparams_display_sorted_names() {
        let params = Hyperparams::Knn {
            n_neighbors: 7,
            weights: Weighting::Distance,
        };
        assert_eq!(params.to_string(), "n_neighbors=7, weights=distance");
    }
}
