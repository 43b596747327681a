#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature derivation, imputation, and label encoding.
//!
//! [`fit_encoders`] produces an immutable [`EncoderBundle`] that every later
//! step receives explicitly. Encoded codes are only meaningful relative to
//! the bundle that produced them; a category the bundle never saw is
//! reported as [`EncodeError::UnknownCategory`] rather than silently mapped.

pub mod derive;
pub mod encoding;

use chrono::NaiveDateTime;
use crime_risk_crime_models::{CategoricalField, FeatureVector, IncidentRecord};
use serde::{Deserialize, Serialize};

use crate::derive::TimeFeatures;
use crate::encoding::{LabelEncoder, MostFrequentImputer};

/// Errors that can occur while fitting or applying encoders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A categorical column had no observed values to fit on.
    #[error("Column {field} has no observed values")]
    EmptyColumn {
        /// The empty column.
        field: CategoricalField,
    },

    /// A category was not seen when the encoders were fitted.
    #[error("Unknown {field} category: {value:?}")]
    UnknownCategory {
        /// The column the value belongs to.
        field: CategoricalField,
        /// The unseen value.
        value: String,
    },
}

/// Fitted imputers and encoders for one run.
///
/// Never mutated after [`fit_encoders`] returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderBundle {
    location_imputer: MostFrequentImputer,
    primary_type_imputer: MostFrequentImputer,
    location_encoder: LabelEncoder,
    primary_type_encoder: LabelEncoder,
}

/// Fits imputers and label encoders over the full loaded dataset.
///
/// Imputation happens first, so the fill values are part of each encoder's
/// category set.
///
/// # Errors
///
/// Returns [`EncodeError::EmptyColumn`] if either categorical column has no
/// observed values.
pub fn fit_encoders(records: &[IncidentRecord]) -> Result<EncoderBundle, EncodeError> {
    let location_imputer =
        MostFrequentImputer::fit(records.iter().map(|r| r.location_description.as_deref()))
            .ok_or(EncodeError::EmptyColumn {
                field: CategoricalField::LocationDescription,
            })?;
    let primary_type_imputer =
        MostFrequentImputer::fit(records.iter().map(|r| r.primary_type.as_deref())).ok_or(
            EncodeError::EmptyColumn {
                field: CategoricalField::PrimaryType,
            },
        )?;

    let location_encoder = LabelEncoder::fit(
        records
            .iter()
            .map(|r| location_imputer.transform(r.location_description.as_deref())),
    );
    let primary_type_encoder = LabelEncoder::fit(
        records
            .iter()
            .map(|r| primary_type_imputer.transform(r.primary_type.as_deref())),
    );

    log::info!(
        "Fitted encoders: {} location categories (fill {:?}), {} crime types (fill {:?})",
        location_encoder.classes().len(),
        location_imputer.fill_value(),
        primary_type_encoder.classes().len(),
        primary_type_imputer.fill_value(),
    );

    Ok(EncoderBundle {
        location_imputer,
        primary_type_imputer,
        location_encoder,
        primary_type_encoder,
    })
}

impl EncoderBundle {
    /// Encodes one record into a feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnknownCategory`] if the record carries a
    /// category the bundle was not fitted on.
    pub fn encode(&self, record: &IncidentRecord) -> Result<FeatureVector, EncodeError> {
        self.encode_parts(
            &record.occurred_at,
            record.location_description.as_deref(),
            record.primary_type.as_deref(),
        )
    }

    /// Encodes raw parts (timestamp and optional categories) into a feature
    /// vector. Missing categories are imputed.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnknownCategory`] for unseen categories.
    pub fn encode_parts(
        &self,
        occurred_at: &NaiveDateTime,
        location_description: Option<&str>,
        primary_type: Option<&str>,
    ) -> Result<FeatureVector, EncodeError> {
        let time = TimeFeatures::from_timestamp(occurred_at);

        let location = self.location_imputer.transform(location_description);
        let location_code =
            self.location_encoder
                .transform(location)
                .ok_or_else(|| EncodeError::UnknownCategory {
                    field: CategoricalField::LocationDescription,
                    value: location.to_string(),
                })?;

        let primary = self.primary_type_imputer.transform(primary_type);
        let primary_code = self.primary_type_encoder.transform(primary).ok_or_else(|| {
            EncodeError::UnknownCategory {
                field: CategoricalField::PrimaryType,
                value: primary.to_string(),
            }
        })?;

        Ok(FeatureVector {
            hour: time.hour,
            location_code,
            primary_code,
            is_weekend: time.is_weekend,
            is_night: time.is_night,
        })
    }

    /// The fitted location encoder.
    #[must_use]
    pub const fn location_encoder(&self) -> &LabelEncoder {
        &self.location_encoder
    }

    /// The fitted primary-type encoder.
    #[must_use]
    pub const fn primary_type_encoder(&self) -> &LabelEncoder {
        &self.primary_type_encoder
    }
}

/// Feature vectors and labels for a set of records, in record order.
#[derive(Debug, Clone, Default)]
pub struct EncodedRecords {
    /// One feature vector per record.
    pub features: Vec<FeatureVector>,
    /// Arrest labels aligned with `features`.
    pub labels: Vec<bool>,
}

/// Encodes every record with the given bundle.
///
/// # Errors
///
/// Returns the first [`EncodeError`] encountered. With a bundle fitted on the
/// same records this cannot fail.
pub fn encode_records(
    bundle: &EncoderBundle,
    records: &[IncidentRecord],
) -> Result<EncodedRecords, EncodeError> {
    let mut encoded = EncodedRecords {
        features: Vec::with_capacity(records.len()),
        labels: Vec::with_capacity(records.len()),
    };
    for record in records {
        encoded.features.push(bundle.encode(record)?);
        encoded.labels.push(record.arrest);
    }
    Ok(encoded)
}
