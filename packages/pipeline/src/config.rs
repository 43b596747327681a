//! Pipeline configuration.
//!
//! The defaults live in `pipeline.toml`, embedded at compile time via
//! [`include_str!`]. A user-supplied file replaces the embedded one wholesale
//! (every field must be present), and individual CLI flags override on top.

use std::path::{Path, PathBuf};

use crime_risk_spatial::map::MapOptions;
use crime_risk_spatial::{DbscanParams, GeoPoint};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// The embedded default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../pipeline.toml");

/// Top-level pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Incident CSV to load.
    pub input: PathBuf,
    /// Directory every output file is written to.
    pub output_dir: PathBuf,
    /// Seed for splitting, resampling, and model fitting.
    pub seed: u64,
    pub training: TrainingConfig,
    pub explain: ExplainConfig,
    pub clustering: ClusteringConfig,
    pub map: MapConfig,
    /// Omit the section to skip saving a model artifact.
    #[serde(default)]
    pub artifact: Option<ArtifactConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Share of each class held out for evaluation.
    pub test_fraction: f64,
    /// Cross-validation folds used by grid search.
    pub cv_folds: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplainConfig {
    /// Upper bound on hold-out rows passed to SHAP.
    pub shap_max_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusteringConfig {
    pub eps: f64,
    pub min_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    /// File name within the output directory.
    pub file: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub zoom: u8,
    pub max_incidents: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    /// File name within the output directory.
    pub file: String,
}

impl PipelineConfig {
    /// Parses the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the embedded file is malformed.
    pub fn embedded() -> Result<Self, PipelineError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] on a parse error or an out-of-range
    /// value.
    pub fn from_toml_str(s: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(s).map_err(|e| PipelineError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read, or
    /// [`PipelineError::Config`] if it is invalid.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        log::debug!("Reading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |message: String| Err(PipelineError::Config { message });

        let fraction = self.training.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return fail(format!("training.test_fraction must be in (0, 1), got {fraction}"));
        }
        if self.training.cv_folds < 2 {
            return fail(format!(
                "training.cv_folds must be at least 2, got {}",
                self.training.cv_folds
            ));
        }
        if !(self.clustering.eps.is_finite() && self.clustering.eps > 0.0) {
            return fail(format!(
                "clustering.eps must be positive, got {}",
                self.clustering.eps
            ));
        }
        if self.clustering.min_points == 0 {
            return fail("clustering.min_points must be at least 1".to_string());
        }
        if self.map.file.is_empty() {
            return fail("map.file must not be empty".to_string());
        }
        if self.artifact.as_ref().is_some_and(|a| a.file.is_empty()) {
            return fail("artifact.file must not be empty".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub const fn dbscan_params(&self) -> DbscanParams {
        DbscanParams {
            eps: self.clustering.eps,
            min_points: self.clustering.min_points,
        }
    }

    #[must_use]
    pub const fn map_options(&self) -> MapOptions {
        MapOptions {
            center: GeoPoint::new(self.map.center_latitude, self.map.center_longitude),
            zoom: self.map.zoom,
            max_incidents: self.map.max_incidents,
        }
    }

    #[must_use]
    pub fn map_path(&self) -> PathBuf {
        self.output_dir.join(&self.map.file)
    }

    #[must_use]
    pub fn artifact_path(&self) -> Option<PathBuf> {
        self.artifact
            .as_ref()
            .map(|artifact| self.output_dir.join(&artifact.file))
    }
}
