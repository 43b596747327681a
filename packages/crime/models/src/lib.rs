#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident record, feature schema, and label types.
//!
//! This crate defines the cleaned incident shape produced by ingestion and
//! the fixed five-column feature schema every model in the pipeline is bound
//! to. Feature codes are only meaningful relative to the encoder bundle that
//! produced them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of columns in the model feature schema.
pub const FEATURE_COUNT: usize = 5;

/// One cleaned crime incident.
///
/// Only the whitelisted columns survive ingestion. Coordinates are kept as a
/// pair: a record either has both or neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// When the incident occurred (local time as published by the source).
    pub occurred_at: NaiveDateTime,
    /// Primary crime type (e.g. `"THEFT"`). `None` when the source cell was
    /// empty.
    pub primary_type: Option<String>,
    /// Free-text location description (e.g. `"STREET"`, `"PARKING LOT"`).
    pub location_description: Option<String>,
    /// Whether an arrest was made. This is the prediction target.
    pub arrest: bool,
    /// Latitude (WGS84).
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
}

impl IncidentRecord {
    /// Returns `(latitude, longitude)` when both are present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Categorical input fields that go through imputation and label encoding.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CategoricalField {
    /// The `location_description` column.
    LocationDescription,
    /// The `primary_type` column.
    PrimaryType,
}

/// Columns of the model feature schema, in matrix column order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureColumn {
    /// Hour of day, 0-23.
    Hour,
    /// Label-encoded location description.
    LocationCode,
    /// Label-encoded primary crime type.
    PrimaryCode,
    /// 1 on Saturday and Sunday.
    IsWeekend,
    /// 1 when the hour is 22 or later, or 4 or earlier.
    IsNight,
}

impl FeatureColumn {
    /// Returns all columns in matrix order.
    #[must_use]
    pub const fn all() -> &'static [Self; FEATURE_COUNT] {
        &[
            Self::Hour,
            Self::LocationCode,
            Self::PrimaryCode,
            Self::IsWeekend,
            Self::IsNight,
        ]
    }

    /// Column index within a feature row.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A derived, encoded feature vector for one incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Code assigned by the location encoder.
    pub location_code: u32,
    /// Code assigned by the primary-type encoder.
    pub primary_code: u32,
    /// Saturday or Sunday.
    pub is_weekend: bool,
    /// Night-time incident.
    pub is_night: bool,
}

impl FeatureVector {
    /// Flattens the vector into a numeric row in [`FeatureColumn`] order.
    #[must_use]
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            f64::from(self.hour),
            f64::from(self.location_code),
            f64::from(self.primary_code),
            f64::from(u8::from(self.is_weekend)),
            f64::from(u8::from(self.is_night)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(lat: Option<f64>, lng: Option<f64>) -> IncidentRecord {
        IncidentRecord {
            occurred_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            primary_type: Some("THEFT".to_string()),
            location_description: Some("STREET".to_string()),
            arrest: false,
            latitude: lat,
            longitude: lng,
        }
    }

    #[test]
    fn coordinates_require_both_values() {
        assert_eq!(
            record(Some(41.9), Some(-87.6)).coordinates(),
            Some((41.9, -87.6))
        );
        assert_eq!(record(Some(41.9), None).coordinates(), None);
        assert_eq!(record(None, Some(-87.6)).coordinates(), None);
        assert_eq!(record(Some(f64::NAN), Some(-87.6)).coordinates(), None);
    }

    #[test]
    fn feature_columns_are_in_matrix_order() {
        for (i, column) in FeatureColumn::all().iter().enumerate() {
            assert_eq!(column.index(), i);
        }
        assert_eq!(FeatureColumn::LocationCode.to_string(), "LOCATION_CODE");
    }

    #[test]
    fn feature_vector_flattens_flags_to_zero_one() {
        let vector = FeatureVector {
            hour: 23,
            location_code: 4,
            primary_code: 7,
            is_weekend: true,
            is_night: false,
        };
        assert_eq!(vector.to_row(), [23.0, 4.0, 7.0, 1.0, 0.0]);
    }
}
