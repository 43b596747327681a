//! Model evaluation charts.

use std::path::Path;

use crime_risk_ml::explain::ShapValues;
use crime_risk_ml::metrics::{ClassificationMetrics, ConfusionMatrix, Evaluation};
use ndarray::ArrayView2;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::{FONT_FAMILY, ReportError, blend, blues, ensure_font, series_color, slot_end};

const CLASS_LABELS: [&str; 2] = ["No Arrest", "Arrest"];

/// Draws a 2x2 confusion matrix with actual classes as rows.
///
/// Cell shading runs from zero to the largest count.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
#[allow(clippy::cast_precision_loss)]
pub fn confusion_matrix(
    path: &Path,
    model_name: &str,
    matrix: &ConfusionMatrix,
) -> Result<(), ReportError> {
    ensure_font()?;
    let rows = matrix.as_rows();
    let max = rows.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;

    let root = BitMapBackend::new(path, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Confusion Matrix - {model_name}"), (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(
            (0..slot_end(2)).into_segmented(),
            (0..slot_end(2)).into_segmented(),
        )?;

    let label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => CLASS_LABELS.get(*i).copied().unwrap_or("").to_string(),
        _ => String::new(),
    };
    let flipped = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) if *i < 2 => CLASS_LABELS[1 - *i].to_string(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Predicted")
        .y_desc("Actual")
        .x_labels(2)
        .y_labels(2)
        .x_label_formatter(&label)
        .y_label_formatter(&flipped)
        .draw()?;

    // Actual class 0 is drawn on the top row.
    for (actual, row) in rows.iter().enumerate() {
        let slot = 1 - actual;
        for (predicted, &count) in row.iter().enumerate() {
            let shade = count as f64 / max;
            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(predicted), SegmentValue::Exact(slot)),
                    (SegmentValue::Exact(predicted + 1), SegmentValue::Exact(slot + 1)),
                ],
                blues(shade).filled(),
            )))?;
            let ink = if shade > 0.5 { WHITE } else { BLACK };
            chart.draw_series(std::iter::once(Text::new(
                count.to_string(),
                (SegmentValue::CenterOf(predicted), SegmentValue::CenterOf(slot)),
                (FONT_FAMILY, 28)
                    .into_font()
                    .color(&ink)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Overlays the ROC curve of every model that has one.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn roc_curves(path: &Path, evaluations: &[Evaluation]) -> Result<(), ReportError> {
    ensure_font()?;
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("ROC Curves", (FONT_FAMILY, 26))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)?;
    chart
        .configure_mesh()
        .x_desc("False Positive Rate")
        .y_desc("True Positive Rate")
        .draw()?;

    chart.draw_series(LineSeries::new(
        [(0.0, 0.0), (1.0, 1.0)],
        BLACK.mix(0.4).stroke_width(1),
    ))?;

    for (i, evaluation) in evaluations.iter().enumerate() {
        let Some(roc) = &evaluation.roc else {
            log::debug!("No ROC curve for {}", evaluation.kind.display_name());
            continue;
        };
        let color = series_color(i);
        chart
            .draw_series(LineSeries::new(
                roc.points
                    .iter()
                    .map(|p| (p.false_positive_rate, p.true_positive_rate)),
                color.stroke_width(2),
            ))?
            .label(format!(
                "{} (AUC = {:.2})",
                evaluation.kind.display_name(),
                roc.auc
            ))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((FONT_FAMILY, 16))
        .draw()?;

    root.present()?;
    Ok(())
}

type MetricPicker = fn(&ClassificationMetrics) -> f64;

const COMPARED_METRICS: [(&str, MetricPicker); 4] = [
    ("Accuracy", |m: &ClassificationMetrics| m.accuracy),
    ("Precision", |m: &ClassificationMetrics| m.precision),
    ("Recall", |m: &ClassificationMetrics| m.recall),
    ("F1 Score", |m: &ClassificationMetrics| m.f1),
];

/// Four bar panels (accuracy, precision, recall, F1), one bar per model.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn model_comparison(path: &Path, evaluations: &[Evaluation]) -> Result<(), ReportError> {
    ensure_font()?;
    let names: Vec<&str> = evaluations.iter().map(|e| e.kind.display_name()).collect();

    let root = BitMapBackend::new(path, (1200, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Model Comparison", (FONT_FAMILY, 30))?;

    for (area, (title, pick)) in root.split_evenly((2, 2)).iter().zip(COMPARED_METRICS) {
        let mut chart = ChartBuilder::on(area)
            .caption(title, (FONT_FAMILY, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(45)
            .build_cartesian_2d((0..slot_end(names.len())).into_segmented(), 0f64..1.05f64)?;

        let label = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => names.get(*i).copied().unwrap_or("").to_string(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len().max(1))
            .x_label_formatter(&label)
            .x_label_style((FONT_FAMILY, 12))
            .y_desc(title)
            .draw()?;

        for (i, evaluation) in evaluations.iter().enumerate() {
            let value = pick(&evaluation.metrics);
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(i), 0.0),
                    (SegmentValue::Exact(i + 1), value),
                ],
                series_color(i).filled(),
            );
            bar.set_margin(0, 0, 8, 8);
            chart.draw_series(std::iter::once(bar))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{value:.3}"),
                (SegmentValue::CenterOf(i), value),
                (FONT_FAMILY, 13)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Bottom)),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Horizontal bars, most important feature on top.
///
/// # Errors
///
/// Returns [`ReportError::InvalidData`] when `names` and `importances`
/// differ in length, or a render error.
pub fn feature_importance(
    path: &Path,
    names: &[String],
    importances: &[f64],
) -> Result<(), ReportError> {
    if names.len() != importances.len() {
        return Err(ReportError::InvalidData {
            message: format!(
                "{} feature names for {} importances",
                names.len(),
                importances.len()
            ),
        });
    }
    ensure_font()?;

    let mut ranked: Vec<(&str, f64)> = names
        .iter()
        .map(String::as_str)
        .zip(importances.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let n = ranked.len();
    let max = ranked.first().map_or(0.0, |(_, v)| *v).max(1e-9);

    let root = BitMapBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Random Forest Feature Importance", (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(130)
        .build_cartesian_2d(0f64..max * 1.1, (0..slot_end(n)).into_segmented())?;

    let label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(slot) if *slot < n => ranked[n - 1 - slot].0.to_string(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n.max(1))
        .y_label_formatter(&label)
        .x_desc("Mean impurity decrease")
        .draw()?;

    chart.draw_series(ranked.iter().enumerate().map(|(rank, (_, value))| {
        let slot = n - 1 - rank;
        let mut bar = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(slot)),
                (*value, SegmentValue::Exact(slot + 1)),
            ],
            series_color(0).filled(),
        );
        bar.set_margin(6, 6, 0, 0);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Beeswarm-style summary: one row per feature, one dot per explained
/// sample at its SHAP value, coloured from low (blue) to high (red) feature
/// value. Features are ordered by mean absolute SHAP value, largest on top.
///
/// # Errors
///
/// Returns [`ReportError::InvalidData`] when the shapes disagree, or a
/// render error.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn shap_summary(
    path: &Path,
    names: &[String],
    shap: &ShapValues,
    features: ArrayView2<'_, f64>,
) -> Result<(), ReportError> {
    if shap.values.dim() != features.dim() || shap.values.ncols() != names.len() {
        return Err(ReportError::InvalidData {
            message: format!(
                "SHAP values {:?}, features {:?}, {} names",
                shap.values.dim(),
                features.dim(),
                names.len()
            ),
        });
    }
    ensure_font()?;

    let n = names.len();
    let mean_abs = shap.mean_abs();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| mean_abs[b].total_cmp(&mean_abs[a]));

    let bound = shap
        .values
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1e-3)
        * 1.1;

    let root = BitMapBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("SHAP Summary (Random Forest)", (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(130)
        .build_cartesian_2d(-bound..bound, (0..slot_end(n)).into_segmented())?;

    let label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(slot) if *slot < n => names[order[n - 1 - slot]].clone(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n.max(1))
        .y_label_formatter(&label)
        .x_desc("SHAP value (impact on arrest probability)")
        .draw()?;

    chart.draw_series(LineSeries::new(
        [
            (0.0, SegmentValue::Exact(0)),
            (0.0, SegmentValue::Exact(n)),
        ],
        BLACK.mix(0.5),
    ))?;

    let low = RGBColor(0, 138, 230);
    let high = RGBColor(255, 0, 82);
    for (rank, &feature) in order.iter().enumerate() {
        let slot = n - 1 - rank;
        let column = features.column(feature);
        let (min, max) = column
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let span = max - min;

        chart.draw_series(shap.values.column(feature).iter().zip(column).enumerate().map(
            |(row, (value, raw))| {
                let t = if span > 0.0 { (raw - min) / span } else { 0.5 };
                // Fixed per-row jitter.
                let jitter = ((row * 7919) % 25) as i32 - 12;
                EmptyElement::at((*value, SegmentValue::CenterOf(slot)))
                    + Circle::new((0, jitter), 2, blend(low, high, t).mix(0.8).filled())
            },
        ))?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crime_risk_ml::ModelKind;
    use crime_risk_ml::metrics::{RocCurve, RocPoint};
    use ndarray::Array2;

    use super::*;

    fn evaluation(kind: ModelKind, tp: usize) -> Evaluation {
        let confusion = ConfusionMatrix {
            true_negatives: 40,
            false_positives: 5,
            false_negatives: 10 - tp,
            true_positives: tp,
        };
        let point = |fpr, tpr| RocPoint {
            false_positive_rate: fpr,
            true_positive_rate: tpr,
            threshold: 0.5,
        };
        Evaluation {
            kind,
            confusion,
            metrics: confusion.metrics(),
            roc: Some(RocCurve {
                points: vec![point(0.0, 0.0), point(0.1, 0.6), point(1.0, 1.0)],
                auc: 0.75,
            }),
        }
    }

    fn assert_png(path: &Path) {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"), "{} is not a PNG", path.display());
    }

    #[test]
    fn renders_model_charts() {
        let dir = tempfile::tempdir().unwrap();
        let evaluations = vec![
            evaluation(ModelKind::RandomForest, 7),
            evaluation(ModelKind::NaiveBayes, 3),
        ];

        let path = dir.path().join("cm.png");
        confusion_matrix(&path, "Random Forest", &evaluations[0].confusion).unwrap();
        assert_png(&path);

        let path = dir.path().join("roc.png");
        roc_curves(&path, &evaluations).unwrap();
        assert_png(&path);

        let path = dir.path().join("cmp.png");
        model_comparison(&path, &evaluations).unwrap();
        assert_png(&path);
    }

    #[test]
    fn renders_importance_and_shap() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = ["A", "B", "C"].iter().map(ToString::to_string).collect();

        let path = dir.path().join("fi.png");
        feature_importance(&path, &names, &[0.2, 0.5, 0.3]).unwrap();
        assert_png(&path);

        let shap = ShapValues {
            base_value: 0.3,
            values: Array2::from_shape_fn((20, 3), |(i, j)| (i as f64 - 10.0) * 0.01 * (j as f64 + 1.0)),
        };
        let features = Array2::from_shape_fn((20, 3), |(i, j)| (i * (j + 1)) as f64);
        let path = dir.path().join("shap.png");
        shap_summary(&path, &names, &shap, features.view()).unwrap();
        assert_png(&path);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["A".to_string()];
        assert!(matches!(
            feature_importance(&dir.path().join("x.png"), &names, &[0.1, 0.2]),
            Err(ReportError::InvalidData { .. })
        ));

        let shap = ShapValues {
            base_value: 0.0,
            values: Array2::zeros((4, 1)),
        };
        let features = Array2::zeros((3, 1));
        assert!(matches!(
            shap_summary(&dir.path().join("y.png"), &names, &shap, features.view()),
            Err(ReportError::InvalidData { .. })
        ));
    }
}
