//! Feature matrix plus labels, and the stratified index splits used for
//! hold-out evaluation and cross-validation.

use crime_risk_crime_models::{FEATURE_COUNT, FeatureVector};
use ndarray::{Array2, ArrayView1, Axis};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;

use crate::ModelError;

/// A dense feature matrix with one boolean label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Rows are samples, columns are features.
    pub x: Array2<f64>,
    /// `true` for the positive (arrest) class.
    pub y: Vec<bool>,
}

impl Dataset {
    /// Creates a dataset, checking that labels line up with rows.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidInput`] if the row and label counts
    /// differ.
    pub fn new(x: Array2<f64>, y: Vec<bool>) -> Result<Self, ModelError> {
        if x.nrows() != y.len() {
            return Err(ModelError::InvalidInput {
                message: format!("{} rows but {} labels", x.nrows(), y.len()),
            });
        }
        Ok(Self { x, y })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Returns `(negatives, positives)`.
    #[must_use]
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.y.iter().filter(|&&label| label).count();
        (self.y.len() - positives, positives)
    }

    #[must_use]
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.x.row(i)
    }

    /// Copies the given rows, in the given order, into a new dataset.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Labels as `0.0` / `1.0` regression targets.
    #[must_use]
    pub fn targets(&self) -> Vec<f64> {
        self.y.iter().map(|&label| f64::from(u8::from(label))).collect()
    }
}

/// Builds a dataset from encoded feature vectors and aligned labels.
///
/// # Errors
///
/// Returns [`ModelError::InvalidInput`] if the slices differ in length.
pub fn build_dataset(features: &[FeatureVector], labels: &[bool]) -> Result<Dataset, ModelError> {
    let rows: Vec<[f64; FEATURE_COUNT]> = features.iter().map(FeatureVector::to_row).collect();
    let x = Array2::from_shape_fn((rows.len(), FEATURE_COUNT), |(i, j)| rows[i][j]);
    Dataset::new(x, labels.to_vec())
}

fn class_indices(y: &[bool]) -> [Vec<usize>; 2] {
    let mut classes = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        classes[usize::from(label)].push(i);
    }
    classes
}

/// Splits row indices into `(train, test)` keeping the class ratio in both
/// parts.
///
/// Each class contributes `round(count * test_fraction)` rows to the test
/// side, but never all of its rows when it has at least two. Both index
/// lists are returned in ascending order.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn stratified_split(y: &[bool], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for mut indices in class_indices(y) {
        indices.shuffle(&mut rng);
        let mut n_test = (indices.len() as f64 * test_fraction).round() as usize;
        if indices.len() >= 2 {
            n_test = n_test.min(indices.len() - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// One cross-validation fold as `(train, validation)` row indices.
pub type Fold = (Vec<usize>, Vec<usize>);

/// Builds `k` stratified, unshuffled folds.
///
/// Each class's rows are cut into `k` contiguous chunks (earlier chunks take
/// the remainder), and fold `i` validates on chunk `i` of every class.
///
/// # Errors
///
/// Returns [`ModelError::TooFewSamples`] when `k < 2` or there are fewer
/// rows than folds.
pub fn stratified_folds(y: &[bool], k: usize) -> Result<Vec<Fold>, ModelError> {
    if k < 2 || y.len() < k {
        return Err(ModelError::TooFewSamples {
            samples: y.len(),
            folds: k,
        });
    }

    let mut validation: Vec<Vec<usize>> = vec![Vec::new(); k];
    for indices in class_indices(y) {
        let base = indices.len() / k;
        let extra = indices.len() % k;
        let mut start = 0;
        for (fold, chunk) in validation.iter_mut().enumerate() {
            let size = base + usize::from(fold < extra);
            chunk.extend_from_slice(&indices[start..start + size]);
            start += size;
        }
    }

    Ok(validation
        .into_iter()
        .map(|mut val| {
            val.sort_unstable();
            let mut in_val = vec![false; y.len()];
            for &i in &val {
                in_val[i] = true;
            }
            let train = (0..y.len()).filter(|&i| !in_val[i]).collect();
            (train, val)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(negatives: usize, positives: usize) -> Vec<bool> {
        let mut y = vec![false; negatives];
        y.extend(std::iter::repeat_n(true, positives));
        y
    }

    #[test]
    fn split_preserves_class_ratio() {
        let y = labels(90, 10);
        let (train, test) = stratified_split(&y, 0.2, 42);
        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.iter().filter(|&&i| y[i]).count(), 2);
        assert_eq!(test.iter().filter(|&&i| !y[i]).count(), 18);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn split_is_deterministic_for_seed() {
        let y = labels(40, 20);
        assert_eq!(stratified_split(&y, 0.2, 7), stratified_split(&y, 0.2, 7));
    }

    #[test]
    fn folds_cover_every_row_once() {
        let y = labels(23, 7);
        let folds = stratified_folds(&y, 5).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen = vec![0; y.len()];
        for (train, val) in &folds {
            assert_eq!(train.len() + val.len(), y.len());
            for &i in val {
                seen[i] += 1;
            }
            let positives = val.iter().filter(|&&i| y[i]).count();
            assert!((1..=2).contains(&positives));
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn folds_need_enough_rows() {
        assert!(matches!(
            stratified_folds(&labels(2, 1), 5),
            Err(ModelError::TooFewSamples { samples: 3, folds: 5 })
        ));
    }

    #[test]
    fn builds_dataset_from_feature_vectors() {
        let features = vec![
            FeatureVector {
                hour: 23,
                location_code: 4,
                primary_code: 1,
                is_weekend: true,
                is_night: true,
            },
            FeatureVector {
                hour: 12,
                location_code: 0,
                primary_code: 2,
                is_weekend: false,
                is_night: false,
            },
        ];
        let data = build_dataset(&features, &[true, false]).unwrap();
        assert_eq!(data.x.dim(), (2, FEATURE_COUNT));
        assert_eq!(data.row(0).to_vec(), vec![23.0, 4.0, 1.0, 1.0, 1.0]);
        assert_eq!(data.class_counts(), (1, 1));
        assert!(build_dataset(&features, &[true]).is_err());
    }
}
