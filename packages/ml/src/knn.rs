//! Brute-force k-nearest-neighbours classifier.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::dataset::Dataset;
use crate::{Classifier, ModelError};

/// How neighbour votes are weighted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Weighting {
    /// Every neighbour counts the same.
    Uniform,
    /// Votes weighted by inverse Euclidean distance.
    Distance,
}

/// Squared Euclidean distance between two rows.
#[must_use]
pub fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum()
}

/// Indices of the `k` rows of `x` nearest to `row`, ordered by distance with
/// ties broken by index. `exclude` skips one row (the query itself).
#[must_use]
pub fn nearest_neighbours(
    x: &Array2<f64>,
    row: ArrayView1<'_, f64>,
    k: usize,
    exclude: Option<usize>,
) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = x
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(i, other)| (i, squared_distance(row, other)))
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.truncate(k);
    distances
        .into_iter()
        .map(|(i, d2)| (i, d2.sqrt()))
        .collect()
}

/// A stored training set queried at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knn {
    x: Array2<f64>,
    y: Vec<bool>,
    k: usize,
    weighting: Weighting,
}

impl Knn {
    /// Stores the training data.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingSet`] or, when `k` is zero or
    /// larger than the training set, [`ModelError::InvalidHyperparameter`].
    pub fn fit(data: &Dataset, k: usize, weighting: Weighting) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if k == 0 || k > data.len() {
            return Err(ModelError::InvalidHyperparameter {
                message: format!("n_neighbors={k} with {} training rows", data.len()),
            });
        }
        Ok(Self {
            x: data.x.clone(),
            y: data.y.clone(),
            k,
            weighting,
        })
    }
}

impl Classifier for Knn {
    #[allow(clippy::float_cmp)]
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let neighbours = nearest_neighbours(&self.x, row, self.k, None);

        let weights: Vec<f64> = match self.weighting {
            Weighting::Uniform => vec![1.0; neighbours.len()],
            Weighting::Distance => {
                // Exact matches take all the weight.
                if neighbours.iter().any(|&(_, d)| d == 0.0) {
                    neighbours
                        .iter()
                        .map(|&(_, d)| if d == 0.0 { 1.0 } else { 0.0 })
                        .collect()
                } else {
                    neighbours.iter().map(|&(_, d)| 1.0 / d).collect()
                }
            }
        };

        let total: f64 = weights.iter().sum();
        let positive: f64 = neighbours
            .iter()
            .zip(&weights)
            .filter(|((i, _), _)| self.y[*i])
            .map(|(_, w)| w)
            .sum();
        if total > 0.0 { positive / total } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn line() -> Dataset {
        Dataset::new(
            array![[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]],
            vec![false, false, false, true, true, true],
        )
        .unwrap()
    }

    #[test]
    fn uniform_vote_fraction() {
        let model = Knn::fit(&line(), 3, Weighting::Uniform).unwrap();
        assert!((model.predict_proba_row(array![1.0].view())).abs() < 1e-12);
        // Neighbours of 6.0: 2 (d=4), 10 (d=4), 1 (d=5) -> ties by index.
        let p = model.predict_proba_row(array![6.0].view());
        assert!((p - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn distance_weighting_prefers_closer_points() {
        let model = Knn::fit(&line(), 3, Weighting::Distance).unwrap();
        let p = model.predict_proba_row(array![6.5].view());
        // Neighbours 10 (d=3.5), 2 (d=4.5), 11 (d=4.5).
        let expected = (1.0 / 3.5 + 1.0 / 4.5) / (1.0 / 3.5 + 2.0 / 4.5);
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn exact_match_takes_all_weight() {
        let model = Knn::fit(&line(), 5, Weighting::Distance).unwrap();
        assert!((model.predict_proba_row(array![11.0].view()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn neighbour_ties_break_by_index() {
        let x = array![[1.0], [-1.0], [1.0]];
        let found = nearest_neighbours(&x, array![0.0].view(), 2, None);
        assert_eq!(found.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
        let found = nearest_neighbours(&x, array![1.0].view(), 1, Some(0));
        assert_eq!(found[0].0, 2);
    }

    #[test]
    fn k_larger_than_training_set_is_rejected() {
        assert!(Knn::fit(&line(), 7, Weighting::Uniform).is_err());
    }
}
