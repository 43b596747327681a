//! Pure per-record feature derivation.
//!
//! Everything here is a deterministic function of a single input row.

use chrono::{Datelike as _, NaiveDateTime, Timelike as _};

/// First hour (inclusive) of the night window.
pub const NIGHT_START_HOUR: u32 = 22;

/// Last hour (inclusive) of the night window.
pub const NIGHT_END_HOUR: u32 = 4;

/// Calendar features derived from an incident timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFeatures {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub day_of_week: u32,
    /// Month, 1-12.
    pub month: u32,
    /// Saturday or Sunday.
    pub is_weekend: bool,
    /// Hour in the night window.
    pub is_night: bool,
}

impl TimeFeatures {
    /// Derives calendar features from a timestamp.
    #[must_use]
    pub fn from_timestamp(ts: &NaiveDateTime) -> Self {
        let hour = ts.hour();
        let day_of_week = ts.weekday().num_days_from_monday();
        Self {
            hour,
            day_of_week,
            month: ts.month(),
            is_weekend: day_of_week >= 5,
            is_night: is_night_hour(hour),
        }
    }
}

/// Whether an hour falls in the night window (22:00 through 04:59).
#[must_use]
pub const fn is_night_hour(hour: u32) -> bool {
    hour >= NIGHT_START_HOUR || hour <= NIGHT_END_HOUR
}

/// A location description split into its leading category and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationParts {
    /// First whitespace-separated token (e.g. `"PARKING"`).
    pub category: Option<String>,
    /// Remaining tokens joined by single spaces (e.g. `"LOT / GARAGE"`).
    pub detail: Option<String>,
}

/// Splits a location description into category and detail.
#[must_use]
pub fn split_location_description(description: &str) -> LocationParts {
    let mut tokens = description.split_whitespace();
    let category = tokens.next().map(str::to_string);
    let rest: Vec<&str> = tokens.collect();
    LocationParts {
        category,
        detail: if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    #[test]
    fn night_flag_matches_window_for_every_hour() {
        for hour in 0..24 {
            let expected = hour >= 22 || hour <= 4;
            assert_eq!(is_night_hour(hour), expected, "hour {hour}");
        }
    }

    #[test]
    fn night_flag_boundaries() {
        assert!(!is_night_hour(21));
        assert!(is_night_hour(22));
        assert!(is_night_hour(4));
        assert!(!is_night_hour(5));
    }

    #[test]
    fn derives_calendar_features() {
        // 2024-05-04 is a Saturday.
        let features = TimeFeatures::from_timestamp(&at(2024, 5, 4, 23));
        assert_eq!(features.hour, 23);
        assert_eq!(features.day_of_week, 5);
        assert_eq!(features.month, 5);
        assert!(features.is_weekend);
        assert!(features.is_night);

        // 2024-05-01 is a Wednesday.
        let features = TimeFeatures::from_timestamp(&at(2024, 5, 1, 12));
        assert_eq!(features.day_of_week, 2);
        assert!(!features.is_weekend);
        assert!(!features.is_night);
    }

    #[test]
    fn splits_location_description() {
        let parts = split_location_description("PARKING LOT / GARAGE (NON.RESID.)");
        assert_eq!(parts.category.as_deref(), Some("PARKING"));
        assert_eq!(parts.detail.as_deref(), Some("LOT / GARAGE (NON.RESID.)"));

        let parts = split_location_description("STREET");
        assert_eq!(parts.category.as_deref(), Some("STREET"));
        assert_eq!(parts.detail, None);

        let parts = split_location_description("   ");
        assert_eq!(parts.category, None);
        assert_eq!(parts.detail, None);
    }
}
