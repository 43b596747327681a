#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PNG chart rendering.
//!
//! This crate only draws: every function takes already computed results and
//! writes one image. Text is rendered with a bundled DejaVu Sans font so the
//! output does not depend on fonts installed on the host.
//!
//! [`render_report`] writes the full set of charts into a directory, logging
//! and skipping any chart that fails to render.

pub mod descriptive;
pub mod models;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crime_risk_analytics_models::DescriptiveSummary;
use crime_risk_crime_models::FeatureColumn;
use crime_risk_ml::ModelKind;
use crime_risk_ml::explain::ShapValues;
use crime_risk_ml::metrics::Evaluation;
use ndarray::Array2;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::style::{FontStyle, RGBColor, register_font};

/// Font family name every chart asks for.
pub const FONT_FAMILY: &str = "sans-serif";

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

pub const CORRELATION_HEATMAP_FILE: &str = "correlation_heatmap.png";
pub const ROC_CURVE_FILE: &str = "roc_curve.png";
pub const MODEL_COMPARISON_FILE: &str = "model_comparison.png";
pub const FEATURE_IMPORTANCE_FILE: &str = "feature_importance.png";
pub const SHAP_SUMMARY_FILE: &str = "shap_summary.png";
pub const ARREST_TREND_FILE: &str = "arrest_trend.png";
pub const CRIME_TYPES_FILE: &str = "crime_types.png";
pub const HOURLY_ARREST_RATE_FILE: &str = "hourly_arrest_rate.png";
pub const WEEKDAY_ARREST_RATE_FILE: &str = "weekday_arrest_rate.png";
pub const MONTHLY_ARREST_RATE_FILE: &str = "monthly_arrest_rate.png";
pub const LOCATION_CATEGORIES_FILE: &str = "location_categories.png";

/// File name of a model's confusion-matrix image.
#[must_use]
pub fn confusion_matrix_file(kind: ModelKind) -> String {
    format!("confusion_matrix_{}.png", kind.file_stem())
}

/// Errors that can occur while rendering a chart.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The bundled font could not be registered.
    #[error("Font error: {message}")]
    Font {
        /// Description of what went wrong.
        message: String,
    },

    /// The drawing backend failed.
    #[error("Render error: {message}")]
    Render {
        /// Backend error text.
        message: String,
    },

    /// The data handed to a chart is inconsistent.
    #[error("Invalid chart data: {message}")]
    InvalidData {
        /// What was wrong.
        message: String,
    },
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ReportError {
    fn from(error: DrawingAreaErrorKind<E>) -> Self {
        Self::Render {
            message: error.to_string(),
        }
    }
}

/// Registers the bundled font under [`FONT_FAMILY`] once per process.
///
/// # Errors
///
/// Returns [`ReportError::Font`] if the font data cannot be parsed.
pub fn ensure_font() -> Result<(), ReportError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
                .map_err(|_| "bundled font is not a valid TrueType file".to_string())
        })
        .clone()
        .map_err(|message| ReportError::Font { message })
}

/// Series colours, cycled by index.
pub(crate) const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

pub(crate) const fn series_color(index: usize) -> RGBColor {
    SERIES_COLORS[index % SERIES_COLORS.len()]
}

/// Linear blend from `from` to `to`, `t` clamped to `[0, 1]`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
pub fn blend(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    RGBColor(
        channel(from.0, to.0),
        channel(from.1, to.1),
        channel(from.2, to.2),
    )
}

/// Sequential white-to-blue scale for counts.
#[must_use]
pub fn blues(t: f64) -> RGBColor {
    blend(RGBColor(247, 251, 255), RGBColor(8, 48, 107), t)
}

/// Diverging blue-white-red scale for values in `[-1, 1]`.
#[must_use]
pub fn coolwarm(value: f64) -> RGBColor {
    let white = RGBColor(221, 221, 221);
    if value < 0.0 {
        blend(white, RGBColor(59, 76, 192), -value)
    } else {
        blend(white, RGBColor(180, 4, 38), value)
    }
}

/// Upper end of a `0..n` index axis split into `n` slots.
///
/// Segmented axes reserve one slot per integer in the inclusive range, so `n`
/// slots need the range `0..n - 1`. A single slot still needs a non-empty
/// range.
pub(crate) fn slot_end(n: usize) -> usize {
    n.saturating_sub(1).max(1)
}

/// SHAP values together with the feature rows they explain.
#[derive(Debug, Clone)]
pub struct ShapSample {
    pub shap: ShapValues,
    /// Same shape as `shap.values`.
    pub features: Array2<f64>,
}

/// Everything the full chart set is drawn from.
#[derive(Debug, Clone)]
pub struct ReportData {
    /// One entry per successfully trained model, in training order.
    pub evaluations: Vec<Evaluation>,
    /// Random-forest importances in feature-column order.
    pub feature_importances: Option<Vec<f64>>,
    pub shap: Option<ShapSample>,
    pub descriptive: DescriptiveSummary,
}

/// Outcome of [`render_report`].
#[derive(Debug, Default)]
pub struct RenderedReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, ReportError)>,
}

impl RenderedReport {
    fn record(&mut self, path: PathBuf, result: Result<(), ReportError>) {
        match result {
            Ok(()) => {
                log::info!("Wrote {}", path.display());
                self.written.push(path);
            }
            Err(e) => {
                log::error!("Failed to render {}: {e}", path.display());
                self.failed.push((path, e));
            }
        }
    }
}

/// Column names in feature order, for chart labels.
#[must_use]
pub fn feature_names() -> Vec<String> {
    FeatureColumn::all().iter().map(ToString::to_string).collect()
}

/// Renders every chart into `output_dir`, overwriting existing files.
///
/// A chart that fails is logged and recorded in
/// [`RenderedReport::failed`]; the rest are still drawn.
#[must_use]
pub fn render_report(output_dir: &Path, data: &ReportData) -> RenderedReport {
    let mut report = RenderedReport::default();
    let names = feature_names();

    let path = output_dir.join(CORRELATION_HEATMAP_FILE);
    let result = descriptive::correlation_heatmap(&path, &data.descriptive.correlation);
    report.record(path, result);

    let path = output_dir.join(ARREST_TREND_FILE);
    let result = descriptive::arrest_trend(&path, &data.descriptive.daily_arrests);
    report.record(path, result);

    let path = output_dir.join(CRIME_TYPES_FILE);
    let result = descriptive::crime_types(&path, &data.descriptive.top_types);
    report.record(path, result);

    let path = output_dir.join(HOURLY_ARREST_RATE_FILE);
    let result = descriptive::hourly_arrest_rate(&path, &data.descriptive.hourly_arrests);
    report.record(path, result);

    let path = output_dir.join(WEEKDAY_ARREST_RATE_FILE);
    let result = descriptive::weekday_arrest_rate(&path, &data.descriptive.weekday_arrests);
    report.record(path, result);

    let path = output_dir.join(MONTHLY_ARREST_RATE_FILE);
    let result = descriptive::monthly_arrest_rate(&path, &data.descriptive.monthly_arrests);
    report.record(path, result);

    let path = output_dir.join(LOCATION_CATEGORIES_FILE);
    let result =
        descriptive::location_categories(&path, &data.descriptive.top_location_categories);
    report.record(path, result);

    for evaluation in &data.evaluations {
        let path = output_dir.join(confusion_matrix_file(evaluation.kind));
        let result =
            models::confusion_matrix(&path, evaluation.kind.display_name(), &evaluation.confusion);
        report.record(path, result);
    }

    if !data.evaluations.is_empty() {
        let path = output_dir.join(ROC_CURVE_FILE);
        let result = models::roc_curves(&path, &data.evaluations);
        report.record(path, result);

        let path = output_dir.join(MODEL_COMPARISON_FILE);
        let result = models::model_comparison(&path, &data.evaluations);
        report.record(path, result);
    }

    if let Some(importances) = &data.feature_importances {
        let path = output_dir.join(FEATURE_IMPORTANCE_FILE);
        let result = models::feature_importance(&path, &names, importances);
        report.record(path, result);
    }

    if let Some(sample) = &data.shap {
        let path = output_dir.join(SHAP_SUMMARY_FILE);
        let result = models::shap_summary(&path, &names, &sample.shap, sample.features.view());
        report.record(path, result);
    }

    report
}
