//! Classification metrics, confusion matrices, and ROC curves.

use serde::{Deserialize, Serialize};

use crate::Classifier;
use crate::dataset::Dataset;
use crate::model::{FittedModel, ModelKind};

/// Binary confusion counts (positive class = arrest).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// Counts outcomes for aligned label slices.
    #[must_use]
    pub fn from_labels(actual: &[bool], predicted: &[bool]) -> Self {
        let mut matrix = Self::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a, p) {
                (false, false) => matrix.true_negatives += 1,
                (false, true) => matrix.false_positives += 1,
                (true, false) => matrix.false_negatives += 1,
                (true, true) => matrix.true_positives += 1,
            }
        }
        matrix
    }

    /// `[[tn, fp], [fn, tp]]`: rows are actual, columns predicted.
    #[must_use]
    pub const fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    /// Derives the headline metrics. Undefined ratios are reported as zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn metrics(&self) -> ClassificationMetrics {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let precision = ratio(self.true_positives, self.true_positives + self.false_positives);
        let recall = ratio(self.true_positives, self.true_positives + self.false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassificationMetrics {
            accuracy: ratio(self.true_positives + self.true_negatives, self.total()),
            precision,
            recall,
            f1,
        }
    }
}

/// Accuracy, precision, recall, and F1 for the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// F1 for the positive class, zero when undefined.
#[must_use]
pub fn f1_score(actual: &[bool], predicted: &[bool]) -> f64 {
    ConfusionMatrix::from_labels(actual, predicted).metrics().f1
}

/// One operating point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
    /// Scores at or above this are predicted positive.
    pub threshold: f64,
}

/// ROC curve plus the area under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

/// Builds a ROC curve with one point per distinct score, starting at the
/// origin. Returns `None` unless both classes are present.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn roc_curve(actual: &[bool], scores: &[f64]) -> Option<RocCurve> {
    let positives = actual.iter().filter(|&&a| a).count();
    let negatives = actual.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..actual.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
        threshold: f64::INFINITY,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]].total_cmp(&threshold).is_eq() {
            if actual[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            false_positive_rate: fp as f64 / negatives as f64,
            true_positive_rate: tp as f64 / positives as f64,
            threshold,
        });
    }

    let auc = points
        .windows(2)
        .map(|w| {
            (w[1].false_positive_rate - w[0].false_positive_rate)
                * f64::midpoint(w[0].true_positive_rate, w[1].true_positive_rate)
        })
        .sum();

    Some(RocCurve { points, auc })
}

/// Hold-out evaluation of one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub kind: ModelKind,
    pub confusion: ConfusionMatrix,
    pub metrics: ClassificationMetrics,
    /// Absent when the hold-out set has a single class.
    pub roc: Option<RocCurve>,
}

/// Scores a model on the hold-out set.
#[must_use]
pub fn evaluate(model: &FittedModel, test: &Dataset) -> Evaluation {
    let scores = model.predict_proba(test.x.view());
    let predicted: Vec<bool> = scores.iter().map(|&p| p >= 0.5).collect();
    let confusion = ConfusionMatrix::from_labels(&test.y, &predicted);
    Evaluation {
        kind: model.kind(),
        confusion,
        metrics: confusion.metrics(),
        roc: roc_curve(&test.y, &scores),
    }
}
