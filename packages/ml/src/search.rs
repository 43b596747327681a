//! Cross-validated grid search.

use rayon::prelude::*;

use crate::dataset::{Dataset, Fold, stratified_folds};
use crate::metrics::f1_score;
use crate::model::{FittedModel, Hyperparams, ModelFamily, ModelKind};
use crate::progress::ProgressCallback;
use crate::{Classifier, ModelError};

/// Cross-validation scores for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub params: Hyperparams,
    /// F1 on each validation fold, in fold order.
    pub fold_scores: Vec<f64>,
}

impl CandidateScore {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.fold_scores.is_empty() {
            return 0.0;
        }
        self.fold_scores.iter().sum::<f64>() / self.fold_scores.len() as f64
    }

    /// Population standard deviation of the fold scores.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn std(&self) -> f64 {
        if self.fold_scores.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .fold_scores
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / self.fold_scores.len() as f64;
        variance.sqrt()
    }
}

/// Every candidate's scores, in enumeration order, plus the winner.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub kind: ModelKind,
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
}

impl SearchOutcome {
    #[must_use]
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }
}

/// The refitted winner of a family's search.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub kind: ModelKind,
    pub params: Hyperparams,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub model: FittedModel,
}

/// Fits on each fold's training rows and scores F1 on its validation rows.
///
/// # Errors
///
/// Returns the first fit error.
pub fn cross_validate(
    params: &Hyperparams,
    data: &Dataset,
    folds: &[Fold],
    seed: u64,
    progress: &dyn ProgressCallback,
) -> Result<Vec<f64>, ModelError> {
    folds
        .iter()
        .map(|(train, validation)| {
            let model = params.fit(&data.select(train), seed)?;
            let held_out = data.select(validation);
            let predicted = model.predict(held_out.x.view());
            progress.inc(1);
            Ok(f1_score(&held_out.y, &predicted))
        })
        .collect()
}

/// Scores every candidate of a family with stratified k-fold CV.
///
/// Candidates run in parallel but are collected in enumeration order, and
/// the first candidate with the highest mean F1 wins ties.
///
/// # Errors
///
/// Returns [`ModelError::TooFewSamples`] when the data cannot be split into
/// `cv_folds` folds, or the first candidate fit error.
pub fn grid_search(
    family: &ModelFamily,
    data: &Dataset,
    cv_folds: usize,
    seed: u64,
    progress: &dyn ProgressCallback,
) -> Result<SearchOutcome, ModelError> {
    let folds = stratified_folds(&data.y, cv_folds)?;
    let candidates = family.candidates();

    let candidates: Vec<CandidateScore> = candidates
        .par_iter()
        .map(|params| {
            cross_validate(params, data, &folds, seed, progress).map(|fold_scores| {
                CandidateScore {
                    params: *params,
                    fold_scores,
                }
            })
        })
        .collect::<Result<_, _>>()?;

    let mut best_index = 0;
    for (i, candidate) in candidates.iter().enumerate().skip(1) {
        if candidate.mean() > candidates[best_index].mean() {
            best_index = i;
        }
    }

    Ok(SearchOutcome {
        kind: family.kind,
        candidates,
        best_index,
    })
}

/// Searches a family's grid, then refits the winner on all of `data`.
///
/// # Errors
///
/// Propagates search and fit errors.
pub fn train_family(
    family: &ModelFamily,
    data: &Dataset,
    cv_folds: usize,
    seed: u64,
    progress: &dyn ProgressCallback,
) -> Result<TrainedModel, ModelError> {
    progress.set_message(format!("Tuning {}", family.name()));
    let outcome = grid_search(family, data, cv_folds, seed, progress)?;
    let best = outcome.best();
    log::info!(
        "{}: best {} (CV F1 {:.3} +/- {:.3})",
        family.name(),
        best.params,
        best.mean(),
        best.std() * 2.0
    );

    let model = best.params.fit(data, seed)?;
    Ok(TrainedModel {
        kind: family.kind,
        params: best.params,
        cv_mean: best.mean(),
        cv_std: best.std(),
        model,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use ndarray::Array2;

    use super::*;
    use crate::knn::Weighting;
    use crate::progress::NullProgress;

    fn interval_data() -> Dataset {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| (i % 10) as f64);
        let y = (0..100).map(|i| (3..7).contains(&(i % 10))).collect();
        Dataset::new(x, y).unwrap()
    }

    fn forest(max_depth: usize) -> Hyperparams {
        Hyperparams::RandomForest {
            n_estimators: 10,
            max_depth: Some(max_depth),
            min_samples_split: 2,
        }
    }

    #[test]
    fn picks_known_optimum() {
        let family = ModelFamily {
            kind: ModelKind::RandomForest,
            default: forest(1),
            grid: Some(vec![forest(1), forest(5)]),
        };
        let data = interval_data();
        let outcome = grid_search(&family, &data, 5, 42, &NullProgress).unwrap();
        assert_eq!(outcome.best_index, 1);
        assert!((outcome.best().mean() - 1.0).abs() < 1e-12);
        assert!(outcome.candidates[0].mean() < 1.0);

        let again = grid_search(&family, &data, 5, 42, &NullProgress).unwrap();
        assert_eq!(outcome, again);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let family = ModelFamily {
            kind: ModelKind::Knn,
            default: Hyperparams::Knn {
                n_neighbors: 1,
                weights: Weighting::Uniform,
            },
            grid: Some(vec![
                Hyperparams::Knn {
                    n_neighbors: 1,
                    weights: Weighting::Distance,
                },
                Hyperparams::Knn {
                    n_neighbors: 1,
                    weights: Weighting::Uniform,
                },
            ]),
        };
        let outcome = grid_search(&family, &interval_data(), 5, 0, &NullProgress).unwrap();
        assert_eq!(outcome.best_index, 0);
        assert_eq!(outcome.candidates[0].mean(), outcome.candidates[1].mean());
    }

    #[test]
    fn untuned_family_still_reports_cv() {
        let family = ModelFamily {
            kind: ModelKind::NaiveBayes,
            default: Hyperparams::NaiveBayes,
            grid: None,
        };
        let trained = train_family(&family, &interval_data(), 5, 0, &NullProgress).unwrap();
        assert_eq!(trained.kind, ModelKind::NaiveBayes);
        assert!((0.0..=1.0).contains(&trained.cv_mean));
        assert!(trained.cv_std >= 0.0);
    }

    #[derive(Default)]
    struct FitCounter {
        fits: AtomicU64,
    }

    impl ProgressCallback for FitCounter {
        fn set_total(&self, _total: u64) {}
        fn inc(&self, delta: u64) {
            self.fits.fetch_add(delta, Ordering::SeqCst);
        }
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    #[test]
    fn reports_one_unit_per_fold_fit() {
        let family = ModelFamily {
            kind: ModelKind::RandomForest,
            default: forest(1),
            grid: Some(vec![forest(1), forest(2), forest(5)]),
        };
        let counter = FitCounter::default();
        train_family(&family, &interval_data(), 4, 7, &counter).unwrap();
        assert_eq!(counter.fits.load(Ordering::SeqCst), 3 * 4);
    }

    #[test]
    fn too_few_rows_for_folds() {
        let data = Dataset::new(Array2::zeros((3, 1)), vec![true, false, true]).unwrap();
        let family = ModelFamily {
            kind: ModelKind::NaiveBayes,
            default: Hyperparams::NaiveBayes,
            grid: None,
        };
        assert!(matches!(
            grid_search(&family, &data, 5, 0, &NullProgress),
            Err(ModelError::TooFewSamples { .. })
        ));
    }

    #[test]
    fn std_is_population_std() {
        let score = CandidateScore {
            params: Hyperparams::NaiveBayes,
            fold_scores: vec![0.5, 1.0],
        };
        assert!((score.mean() - 0.75).abs() < 1e-12);
        assert!((score.std() - 0.25).abs() < 1e-12);
    }
}
