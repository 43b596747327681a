//! Cell-level parsing for incident CSV exports.
//!
//! Date, boolean, and coordinate parsing shared by the CSV loader. Every
//! function here is total: malformed input yields `None` rather than an
//! error, so a single bad cell never aborts a load.

use chrono::{NaiveDate, NaiveDateTime};

use crate::literal::{LiteralValue, parse_literal};

/// Timestamp layouts accepted in the `date` column, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

/// Parses an incident timestamp.
///
/// Accepts the Socrata ISO layouts, space-separated ISO, the Chicago portal
/// export layout (`05/01/2024 11:30:00 PM`), and bare dates (midnight).
#[must_use]
pub fn parse_incident_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses the `arrest` column. Accepts the spellings pandas and Socrata emit.
#[must_use]
pub fn parse_arrest_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "1.0" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "0.0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Normalizes a categorical cell. Blank cells are missing values.
#[must_use]
pub fn parse_category(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extracts `(latitude, longitude)` from a dict-like `location` cell.
///
/// Returns `None` when the cell is not a well-formed literal, either key is
/// missing, or either value is not numeric. Values are returned exactly as
/// written in the source.
#[must_use]
pub fn parse_location(cell: &str) -> Option<(f64, f64)> {
    let value = parse_literal(cell).ok()?;
    let latitude = value.get("latitude").and_then(LiteralValue::as_f64)?;
    let longitude = value.get("longitude").and_then(LiteralValue::as_f64)?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use chrono::Timelike as _;

    use super::*;

    #[test]
    fn parses_socrata_date_with_fractional() {
        let dt = parse_incident_date("2024-05-01T14:30:00.000").unwrap();
        assert_eq!(dt.to_string(), "2024-05-01 14:30:00");
    }

    #[test]
    fn parses_chicago_portal_date() {
        let dt = parse_incident_date("05/01/2024 11:15:00 PM").unwrap();
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.minute(), 15);
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let dt = parse_incident_date("2024-05-01").unwrap();
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_incident_date("not-a-date").is_none());
        assert!(parse_incident_date("").is_none());
    }

    #[test]
    fn parses_arrest_spellings() {
        assert_eq!(parse_arrest_flag("True"), Some(true));
        assert_eq!(parse_arrest_flag("false"), Some(false));
        assert_eq!(parse_arrest_flag(" 1 "), Some(true));
        assert_eq!(parse_arrest_flag("maybe"), None);
    }

    #[test]
    fn blank_categories_are_missing() {
        assert_eq!(parse_category("  "), None);
        assert_eq!(parse_category("NaN"), None);
        assert_eq!(parse_category(" STREET "), Some("STREET".to_string()));
    }

    #[test]
    fn extracts_exact_coordinates() {
        let (lat, lng) = parse_location(
            "{'latitude': '41.883864457', 'longitude': '-87.627877018', 'human_address': '{}'}",
        )
        .unwrap();
        assert_eq!(lat, "41.883864457".parse::<f64>().unwrap());
        assert_eq!(lng, "-87.627877018".parse::<f64>().unwrap());
    }

    #[test]
    fn malformed_locations_yield_none() {
        assert_eq!(parse_location(""), None);
        assert_eq!(parse_location("garbage"), None);
        assert_eq!(parse_location("{'latitude': '41.8'}"), None);
        assert_eq!(parse_location("{'latitude': 'x', 'longitude': '-87.6'}"), None);
        assert_eq!(parse_location("{'latitude': '41.8', 'longitude': "), None);
        assert_eq!(parse_location("{'latitude': None, 'longitude': None}"), None);
    }

    #[test]
    fn deeply_nested_location_yields_none() {
        let cell = format!("{{'latitude': {}", "[".repeat(200_000));
        assert_eq!(parse_location(&cell), None);

        let nested = format!(
            "{{'latitude': '41.8', 'longitude': '-87.6', 'extra': {}0{}}}",
            "{'a': ".repeat(100),
            "}".repeat(100)
        );
        assert_eq!(parse_location(&nested), None);
    }
}
