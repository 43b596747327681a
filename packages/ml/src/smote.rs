//! SMOTE oversampling of the minority class.

use ndarray::{Array2, s};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use crate::dataset::Dataset;
use crate::knn::nearest_neighbours;

/// Upper bound on neighbours considered per minority sample.
pub const MAX_NEIGHBOURS: usize = 5;

/// Errors that can occur while resampling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResampleError {
    /// Interpolation needs at least two minority rows.
    #[error("Minority class has {count} example(s); at least 2 are required")]
    InsufficientMinority {
        /// Minority rows available.
        count: usize,
    },
}

/// Balances the classes by synthesising minority rows.
///
/// Each synthetic row is `x_i + u * (x_nn - x_i)` for a random minority row
/// `x_i`, one of its `min(5, n_min - 1)` nearest minority neighbours `x_nn`,
/// and `u` uniform in `[0, 1)`. The original rows come first, in order,
/// followed by the synthetic ones. Already balanced input is returned as is.
///
/// # Errors
///
/// Returns [`ResampleError::InsufficientMinority`] when the minority class
/// has fewer than two rows.
pub fn smote(data: &Dataset, seed: u64) -> Result<Dataset, ResampleError> {
    let (negatives, positives) = data.class_counts();
    if negatives == positives {
        return Ok(data.clone());
    }
    let minority_label = positives < negatives;
    let n_min = negatives.min(positives);
    let n_synthetic = negatives.max(positives) - n_min;
    if n_min < 2 {
        return Err(ResampleError::InsufficientMinority { count: n_min });
    }

    let minority_rows: Vec<usize> = (0..data.len())
        .filter(|&i| data.y[i] == minority_label)
        .collect();
    let minority = data.x.select(ndarray::Axis(0), &minority_rows);
    let k = MAX_NEIGHBOURS.min(n_min - 1);

    let neighbours: Vec<Vec<usize>> = (0..n_min)
        .map(|i| {
            nearest_neighbours(&minority, minority.row(i), k, Some(i))
                .into_iter()
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let n = data.len();
    let mut x = Array2::zeros((n + n_synthetic, data.n_features()));
    x.slice_mut(s![..n, ..]).assign(&data.x);

    let mut rng = StdRng::seed_from_u64(seed);
    for j in 0..n_synthetic {
        let i = rng.gen_range(0..n_min);
        let nn = neighbours[i][rng.gen_range(0..k)];
        let gap: f64 = rng.gen_range(0.0..1.0);
        let base = minority.row(i);
        let synthetic = &base + &((&minority.row(nn) - &base) * gap);
        x.row_mut(n + j).assign(&synthetic);
    }

    let mut y = data.y.clone();
    y.extend(std::iter::repeat_n(minority_label, n_synthetic));

    log::debug!(
        "SMOTE: {n_synthetic} synthetic {} rows (k={k}), {} total",
        if minority_label { "positive" } else { "negative" },
        y.len()
    );

    Ok(Dataset { x, y })
}
