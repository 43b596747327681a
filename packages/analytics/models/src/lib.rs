#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for descriptive analytics over cleaned incidents.
//!
//! These are plain data carriers: the analytics crate computes them and the
//! report crate draws them.

use chrono::NaiveDate;
use crime_risk_crime_models::{FEATURE_COUNT, FeatureColumn};
use serde::{Deserialize, Serialize};

/// Count of incidents sharing one category value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// Category as published (e.g. `"THEFT"` or `"PARKING"`).
    pub category: String,
    /// Number of incidents.
    pub count: u64,
}

/// Share of incidents in one bucket that ended in an arrest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrestRate {
    pub incidents: u64,
    pub arrests: u64,
}

impl ArrestRate {
    /// Arrests divided by incidents, or 0 for an empty bucket.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> f64 {
        if self.incidents == 0 {
            0.0
        } else {
            self.arrests as f64 / self.incidents as f64
        }
    }
}

/// Arrest rate for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyArrestRate {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub rate: ArrestRate,
}

/// Arrest rate for each hour of the day, indexed 0-23.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyArrestRates {
    pub hours: [ArrestRate; 24],
}

impl Default for HourlyArrestRates {
    fn default() -> Self {
        Self {
            hours: [ArrestRate::default(); 24],
        }
    }
}

/// Pearson correlation between every pair of feature columns.
///
/// A column with zero variance correlates as 0 with everything, itself
/// included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    pub values: [[f64; FEATURE_COUNT]; FEATURE_COUNT],
}

impl CorrelationMatrix {
    /// Correlation between two columns.
    #[must_use]
    pub const fn get(&self, a: FeatureColumn, b: FeatureColumn) -> f64 {
        self.values[a.index()][b.index()]
    }

    /// Column labels in matrix order.
    #[must_use]
    pub fn labels() -> Vec<String> {
        FeatureColumn::all().iter().map(ToString::to_string).collect()
    }
}

/// Everything the descriptive charts need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveSummary {
    pub correlation: CorrelationMatrix,
    /// Ordered by date.
    pub daily_arrests: Vec<DailyArrestRate>,
    /// Most frequent first.
    pub top_types: Vec<CategoryCount>,
    /// Leading word of the location description, most frequent first.
    pub top_location_categories: Vec<CategoryCount>,
    pub hourly_arrests: HourlyArrestRates,
    /// Monday first.
    pub weekday_arrests: [ArrestRate; 7],
    /// January first.
    pub monthly_arrests: [ArrestRate; 12],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bucket_rate_is_zero() {
        assert!(ArrestRate::default().rate().abs() < f64::EPSILON);
        let rate = ArrestRate {
            incidents: 4,
            arrests: 1,
        };
        assert!((rate.rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn daily_rate_serializes_flat() {
        let daily = DailyArrestRate {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            rate: ArrestRate {
                incidents: 2,
                arrests: 1,
            },
        };
        let json = serde_json::to_value(daily).unwrap();
        assert_eq!(json["date"], "2024-05-01");
        assert_eq!(json["incidents"], 2);
    }
}
