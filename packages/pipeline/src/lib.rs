#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end arrest-risk pipeline.
//!
//! [`run`] executes the steps in order: load and clean the CSV, fit encoders
//! and derive features, compute descriptive statistics, split and rebalance,
//! tune and evaluate each model family, explain the random forest, cluster
//! incident locations, and finally render every chart, the map, and the
//! model artifact.
//!
//! Failures are scoped: a missing input file or malformed configuration
//! aborts the run, a model family that fails to fit is logged and skipped,
//! and a chart that fails to render is logged and skipped.

pub mod artifact;
pub mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crime_risk_analytics::describe;
use crime_risk_features::{EncodeError, encode_records, fit_encoders};
use crime_risk_ingest::{IngestError, load_incidents};
use crime_risk_ml::dataset::stratified_split;
use crime_risk_ml::explain::forest_shap;
use crime_risk_ml::metrics::{Evaluation, evaluate};
use crime_risk_ml::progress::{ProgressCallback, null_progress};
use crime_risk_ml::search::{TrainedModel, train_family};
use crime_risk_ml::{
    Hyperparams, ModelError, ModelFamily, ModelKind, ResampleError, build_dataset, default_families,
};
use crime_risk_report::{ReportData, ShapSample, render_report};
use crime_risk_spatial::risk::IncidentIndex;
use crime_risk_spatial::{ClusterError, GeoPoint, dbscan, map::write_map};
use ndarray::s;

pub use artifact::{ModelArtifact, score_incident};
pub use config::PipelineConfig;

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration is malformed or out of range.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// File system error outside of CSV loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input CSV could not be loaded.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Encoders could not be fitted or applied.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Dataset construction failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The training split could not be rebalanced.
    #[error(transparent)]
    Resample(#[from] ResampleError),

    /// Clustering rejected its input.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// The model artifact could not be encoded.
    #[error("Artifact encode error: {0}")]
    ArtifactEncode(#[from] rmp_serde::encode::Error),

    /// The model artifact could not be decoded.
    #[error("Artifact decode error: {0}")]
    ArtifactDecode(#[from] rmp_serde::decode::Error),

    /// No incidents survived cleaning.
    #[error("No usable incidents in {path}")]
    NoIncidents {
        /// The input file.
        path: PathBuf,
    },
}

/// Progress indicators for the two long-running parts of a run.
#[derive(Clone)]
pub struct PipelineProgress {
    /// One unit per pipeline step.
    pub steps: Arc<dyn ProgressCallback>,
    /// One unit per cross-validation fit.
    pub training: Arc<dyn ProgressCallback>,
}

impl PipelineProgress {
    /// Progress that reports nowhere.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            steps: null_progress(),
            training: null_progress(),
        }
    }
}

/// Steps reported on [`PipelineProgress::steps`].
pub const STEP_COUNT: u64 = 7;

/// A family that could not be trained.
#[derive(Debug, Clone)]
pub struct FamilyFailure {
    pub kind: ModelKind,
    pub error: ModelError,
}

/// Tuning and hold-out results for one model family.
#[derive(Debug, Clone)]
pub struct ModelResult {
    pub kind: ModelKind,
    pub params: Hyperparams,
    /// Mean cross-validated F1 of the chosen parameters.
    pub cv_mean: f64,
    /// Population standard deviation of the fold scores.
    pub cv_std: f64,
    pub evaluation: Evaluation,
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub incidents: usize,
    pub dropped_rows: usize,
    pub train_rows: usize,
    pub resampled_rows: usize,
    pub test_rows: usize,
    /// Families in training order.
    pub models: Vec<ModelResult>,
    pub failures: Vec<FamilyFailure>,
    pub clusters: usize,
    pub noise_points: usize,
    /// Images that were written.
    pub charts: Vec<PathBuf>,
    /// Images that failed to render.
    pub failed_charts: Vec<PathBuf>,
    pub map: Option<PathBuf>,
    pub artifact: Option<PathBuf>,
}

impl PipelineSummary {
    /// The model with the highest hold-out F1, earliest first on ties.
    #[must_use]
    pub fn best_model(&self) -> Option<&ModelResult> {
        self.models.iter().fold(None, |best: Option<&ModelResult>, candidate| {
            match best {
                Some(current)
                    if current.evaluation.metrics.f1 >= candidate.evaluation.metrics.f1 =>
                {
                    Some(current)
                }
                _ => Some(candidate),
            }
        })
    }
}

/// Runs the full pipeline with the five default model families.
///
/// # Errors
///
/// Returns [`PipelineError`] for fatal failures: an invalid configuration,
/// an unreadable input file, an empty dataset, or a training split that
/// cannot be rebalanced.
pub fn run(
    config: &PipelineConfig,
    progress: &PipelineProgress,
) -> Result<PipelineSummary, PipelineError> {
    run_with_families(config, &default_families(), progress)
}

/// Runs the full pipeline, training `families` in order.
///
/// A family that fails to train is recorded in
/// [`PipelineSummary::failures`] and the run continues without it.
///
/// # Errors
///
/// Same as [`run`].
#[allow(clippy::too_many_lines)]
pub fn run_with_families(
    config: &PipelineConfig,
    families: &[ModelFamily],
    progress: &PipelineProgress,
) -> Result<PipelineSummary, PipelineError> {
    config.validate()?;
    let steps = &progress.steps;
    steps.set_total(STEP_COUNT);
    std::fs::create_dir_all(&config.output_dir)?;

    steps.set_message("Loading incidents".to_string());
    let ingest = load_incidents(&config.input)?;
    if ingest.records.is_empty() {
        return Err(PipelineError::NoIncidents {
            path: config.input.clone(),
        });
    }
    let records = &ingest.records;
    steps.inc(1);

    steps.set_message("Encoding features".to_string());
    let encoders = fit_encoders(records)?;
    let encoded = encode_records(&encoders, records)?;
    let descriptive = describe(records, &encoded.features);
    let dataset = build_dataset(&encoded.features, &encoded.labels)?;
    steps.inc(1);

    steps.set_message("Splitting and resampling".to_string());
    let (train_idx, test_idx) =
        stratified_split(&dataset.y, config.training.test_fraction, config.seed);
    let train = dataset.select(&train_idx);
    let test = dataset.select(&test_idx);
    let resampled = crime_risk_ml::smote::smote(&train, config.seed)?;
    let (negatives, positives) = resampled.class_counts();
    log::info!(
        "Split {} train / {} test rows; resampled training set to {negatives} negative + {positives} positive",
        train.len(),
        test.len()
    );
    steps.inc(1);

    steps.set_message("Training models".to_string());
    let (trained, failures) = train_all(config, families, &resampled, progress.training.as_ref());
    steps.inc(1);

    steps.set_message("Evaluating models".to_string());
    let models: Vec<ModelResult> = trained
        .iter()
        .map(|t| {
            let evaluation = evaluate(&t.model, &test);
            log::info!(
                "{}: accuracy {:.3}, precision {:.3}, recall {:.3}, F1 {:.3}",
                t.kind.display_name(),
                evaluation.metrics.accuracy,
                evaluation.metrics.precision,
                evaluation.metrics.recall,
                evaluation.metrics.f1
            );
            ModelResult {
                kind: t.kind,
                params: t.params,
                cv_mean: t.cv_mean,
                cv_std: t.cv_std,
                evaluation,
            }
        })
        .collect();

    let forest = trained.iter().find_map(|t| t.model.as_random_forest());
    let feature_importances = forest.map(crime_risk_ml::forest::RandomForest::feature_importances);
    let shap = match forest {
        Some(forest) if !test.is_empty() => {
            let rows = test.len().min(config.explain.shap_max_rows);
            let features = test.x.slice(s![..rows, ..]).to_owned();
            match forest_shap(forest, features.view()) {
                Ok(shap) => Some(ShapSample { shap, features }),
                Err(e) => {
                    log::warn!("Skipping SHAP summary: {e}");
                    None
                }
            }
        }
        _ => None,
    };
    steps.inc(1);

    steps.set_message("Clustering locations".to_string());
    let points: Vec<GeoPoint> = records
        .iter()
        .filter_map(|r| r.coordinates().map(|(lat, lon)| GeoPoint::new(lat, lon)))
        .collect();
    let clustering = dbscan(&points, config.dbscan_params())?;
    let map_path = config.map_path();
    let map = match write_map(&map_path, records, &clustering.clusters, config.map_options()) {
        Ok(()) => Some(map_path),
        Err(e) => {
            log::error!("Failed to write map {}: {e}", map_path.display());
            None
        }
    };
    steps.inc(1);

    steps.set_message("Rendering report".to_string());
    let rendered = render_report(
        &config.output_dir,
        &ReportData {
            evaluations: models.iter().map(|m| m.evaluation.clone()).collect(),
            feature_importances,
            shap,
            descriptive,
        },
    );

    let mut summary = PipelineSummary {
        incidents: records.len(),
        dropped_rows: ingest.dropped_rows(),
        train_rows: train.len(),
        resampled_rows: resampled.len(),
        test_rows: test.len(),
        models,
        failures,
        clusters: clustering.clusters.len(),
        noise_points: clustering.noise_count(),
        charts: rendered.written,
        failed_charts: rendered.failed.into_iter().map(|(path, _)| path).collect(),
        map,
        artifact: None,
    };

    if let Some(path) = config.artifact_path() {
        summary.artifact = save_best(&summary, trained, &encoders, &path);
    }
    steps.inc(1);
    steps.finish("Pipeline complete".to_string());

    Ok(summary)
}

/// Tunes every family, collecting failures instead of aborting.
fn train_all(
    config: &PipelineConfig,
    families: &[ModelFamily],
    data: &crime_risk_ml::Dataset,
    progress: &dyn ProgressCallback,
) -> (Vec<TrainedModel>, Vec<FamilyFailure>) {
    let fits: usize = families
        .iter()
        .map(|f| f.candidates().len() * config.training.cv_folds)
        .sum();
    progress.set_total(fits as u64);

    let mut trained = Vec::new();
    let mut failures = Vec::new();
    for family in families {
        match train_family(family, data, config.training.cv_folds, config.seed, progress) {
            Ok(model) => trained.push(model),
            Err(error) => {
                log::error!("Skipping {}: {error}", family.name());
                failures.push(FamilyFailure {
                    kind: family.kind,
                    error,
                });
            }
        }
    }
    progress.finish(format!("Trained {} of {} families", trained.len(), families.len()));
    (trained, failures)
}

/// Saves the best hold-out model. Returns the path on success.
fn save_best(
    summary: &PipelineSummary,
    trained: Vec<TrainedModel>,
    encoders: &crime_risk_features::EncoderBundle,
    path: &Path,
) -> Option<PathBuf> {
    let Some(best) = summary.best_model() else {
        log::warn!("No model trained; not writing an artifact");
        return None;
    };
    let model = trained.into_iter().find(|t| t.kind == best.kind)?.model;
    let artifact = ModelArtifact::new(best.params, best.evaluation.metrics.f1, encoders.clone(), model);
    match artifact.save(path) {
        Ok(()) => Some(path.to_path_buf()),
        Err(e) => {
            log::error!("Failed to write artifact {}: {e}", path.display());
            None
        }
    }
}

/// Loads a CSV and indexes its incidents for area and path lookups.
///
/// # Errors
///
/// Returns [`PipelineError::Ingest`] if the file cannot be loaded.
pub fn load_index(input: &Path) -> Result<IncidentIndex, PipelineError> {
    let ingest = load_incidents(input)?;
    Ok(IncidentIndex::build(&ingest.records))
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use crime_risk_ml::knn::Weighting;
    use crime_risk_report::confusion_matrix_file;

    use super::*;
    use crate::config::ArtifactConfig;

    /// 100 rows, 10 arrests. Arrests cluster in narcotics incidents at night
    /// on the street so the models have signal to find.
    fn synthetic_csv() -> String {
        let mut csv = String::from("date,primary_type,location_description,arrest,location\n");
        for i in 0..100_u32 {
            let arrest = i % 10 == 0;
            let hour = if arrest { 23 } else { (i * 7) % 20 + 2 };
            let day = i % 7 + 1;
            let primary_type = if arrest || i % 13 == 0 { "NARCOTICS" } else if i % 3 == 0 { "BATTERY" } else { "THEFT" };
            let location = if arrest || i % 5 == 0 { "STREET" } else { "APARTMENT" };
            let lat = 41.80 + f64::from(i % 5) * 0.001;
            let lon = -87.60 - f64::from(i % 4) * 0.001;
            writeln!(
                csv,
                "2024-05-0{day}T{hour:02}:15:00.000,{primary_type},{location},{arrest},\"{{'latitude': '{lat}', 'longitude': '{lon}'}}\""
            )
            .unwrap();
        }
        csv
    }

    fn config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::embedded().unwrap();
        let input = dir.join("incidents.csv");
        std::fs::write(&input, synthetic_csv()).unwrap();
        config.input = input;
        config.output_dir = dir.join("out");
        config.explain.shap_max_rows = 10;
        config.artifact = Some(ArtifactConfig {
            file: "model.msgpack".to_string(),
        });
        config
    }

    #[test]
    fn end_to_end_on_synthetic_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let summary = run(&config, &PipelineProgress::silent()).unwrap();

        assert_eq!(summary.incidents, 100);
        assert_eq!(summary.test_rows, 20);
        assert_eq!(summary.train_rows, 80);
        assert_eq!(summary.resampled_rows, 144);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert_eq!(summary.models.len(), 5);
        for model in &summary.models {
            let m = &model.evaluation.metrics;
            for value in [m.accuracy, m.precision, m.recall, m.f1] {
                assert!((0.0..=1.0).contains(&value), "{:?}: {value}", model.kind);
            }
            assert_eq!(model.evaluation.confusion.total(), 20);
        }

        let out = &config.output_dir;
        let confusion_images = std::fs::read_dir(out)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("confusion_matrix_"))
            .count();
        assert_eq!(confusion_images, 5);
        assert!(out.join("model_comparison.png").is_file());
        assert!(out.join("roc_curve.png").is_file());
        assert!(out.join("shap_summary.png").is_file());
        assert!(out.join("crime_map.html").is_file());
        for chart in [
            "location_categories.png",
            "weekday_arrest_rate.png",
            "monthly_arrest_rate.png",
        ] {
            assert!(out.join(chart).is_file(), "{chart}");
        }
        assert!(summary.failed_charts.is_empty());

        // 20 points spread over a 0.004 x 0.003 degree patch form one cluster.
        assert_eq!(summary.clusters, 1);
        assert_eq!(summary.noise_points, 0);

        let artifact_path = summary.artifact.clone().unwrap();
        let artifact = ModelArtifact::load(&artifact_path).unwrap();
        assert_eq!(Some(artifact.kind()), summary.best_model().map(|m| m.kind));
    }

    #[test]
    fn failing_family_is_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let families = [
            ModelFamily {
                kind: ModelKind::AdaBoost,
                default: Hyperparams::AdaBoost {
                    n_estimators: 10,
                    learning_rate: 0.0,
                },
                grid: None,
            },
            ModelFamily {
                kind: ModelKind::Knn,
                default: Hyperparams::Knn {
                    n_neighbors: 1_000,
                    weights: Weighting::Uniform,
                },
                grid: None,
            },
            ModelFamily {
                kind: ModelKind::NaiveBayes,
                default: Hyperparams::NaiveBayes,
                grid: None,
            },
        ];

        let summary = run_with_families(&config, &families, &PipelineProgress::silent()).unwrap();

        let failed: Vec<ModelKind> = summary.failures.iter().map(|f| f.kind).collect();
        assert_eq!(failed, vec![ModelKind::AdaBoost, ModelKind::Knn]);
        assert!(summary.failures.iter().all(|f| matches!(
            f.error,
            ModelError::InvalidHyperparameter { .. }
        )));

        assert_eq!(summary.models.len(), 1);
        assert_eq!(summary.models[0].kind, ModelKind::NaiveBayes);
        assert_eq!(summary.models[0].evaluation.confusion.total(), 20);

        let out = &config.output_dir;
        assert!(out.join(confusion_matrix_file(ModelKind::NaiveBayes)).is_file());
        assert!(!out.join(confusion_matrix_file(ModelKind::Knn)).exists());
        assert!(out.join("model_comparison.png").is_file());

        let artifact = ModelArtifact::load(&summary.artifact.clone().unwrap()).unwrap();
        assert_eq!(artifact.kind(), ModelKind::NaiveBayes);
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.input = dir.path().join("absent.csv");
        assert!(matches!(
            run(&config, &PipelineProgress::silent()),
            Err(PipelineError::Ingest(IngestError::Io(_)))
        ));
    }

    #[test]
    fn index_answers_area_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let index = load_index(&config.input).unwrap();
        assert_eq!(index.len(), 100);
        let advice = index.area_advice(GeoPoint::new(41.802, -87.601), 23);
        assert_eq!(advice.total, 10);
        assert_eq!(advice.top_type.as_deref(), Some("NARCOTICS"));
    }
}
