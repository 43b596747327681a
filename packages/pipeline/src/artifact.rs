//! Persisted model artifact.
//!
//! An artifact bundles a fitted model with the encoders its feature codes
//! came from, so new incidents can be scored without retraining. It is
//! written as named `MessagePack` via `rmp-serde`.

use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use crime_risk_features::{EncodeError, EncoderBundle};
use crime_risk_ml::{Classifier as _, FittedModel, Hyperparams, ModelKind};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Everything needed to score an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub params: Hyperparams,
    /// Hold-out F1 at selection time.
    pub test_f1: f64,
    pub trained_at: NaiveDateTime,
    pub encoders: EncoderBundle,
    pub model: FittedModel,
}

impl ModelArtifact {
    #[must_use]
    pub fn new(
        params: Hyperparams,
        test_f1: f64,
        encoders: EncoderBundle,
        model: FittedModel,
    ) -> Self {
        Self {
            params,
            test_f1,
            trained_at: Utc::now().naive_utc(),
            encoders,
            model,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// Writes the artifact, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let bytes = rmp_serde::to_vec_named(self)?;
        std::fs::write(path, bytes)?;
        log::info!(
            "Saved {} artifact to {}",
            self.kind().display_name(),
            path.display()
        );
        Ok(())
    }

    /// Reads an artifact written by [`ModelArtifact::save`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the file cannot be read or decoded.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path)?;
        Ok(rmp_serde::from_slice(&bytes)?)
    }
}

/// Arrest probability for a single incident.
///
/// Missing categories are imputed the same way as during training.
///
/// # Errors
///
/// Returns [`EncodeError::UnknownCategory`] when a category was not seen
/// during training.
pub fn score_incident(
    artifact: &ModelArtifact,
    occurred_at: &NaiveDateTime,
    location_description: Option<&str>,
    primary_type: Option<&str>,
) -> Result<f64, EncodeError> {
    let features =
        artifact
            .encoders
            .encode_parts(occurred_at, location_description, primary_type)?;
    let row = features.to_row();
    Ok(artifact.model.predict_proba_row(ArrayView1::from(&row[..])))
}
