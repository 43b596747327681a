#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV ingestion and cleaning for crime incident exports.
//!
//! Reads a Socrata-style incident CSV, extracts numeric coordinates from the
//! dict-like `location` column, coerces types, and keeps only the
//! whitelisted columns. Per-row problems are recovered locally: a bad
//! `location` cell only loses that row's coordinates, and rows whose date or
//! arrest flag cannot be read are dropped and counted.

pub mod literal;
pub mod parsing;

use std::io::Read;
use std::path::Path;

use crime_risk_crime_models::IncidentRecord;

use crate::parsing::{parse_arrest_flag, parse_category, parse_incident_date, parse_location};

/// Columns that must be present in the CSV header row.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "date",
    "primary_type",
    "location_description",
    "arrest",
    "location",
];

/// Errors that can occur while loading an incident CSV.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The input file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is missing from the header row.
    #[error("Missing required column: {column}")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },
}

/// Why a row was dropped during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The `date` cell was empty or unparseable.
    InvalidDate,
    /// The `arrest` cell was empty or unparseable.
    InvalidArrestFlag,
}

/// The cleaned output of a CSV load.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Cleaned records, in source order.
    pub records: Vec<IncidentRecord>,
    /// Rows dropped because of an unreadable date.
    pub dropped_invalid_date: usize,
    /// Rows dropped because of an unreadable arrest flag.
    pub dropped_invalid_arrest: usize,
    /// Kept rows whose `location` cell yielded no coordinates.
    pub rows_without_coordinates: usize,
}

impl IngestReport {
    /// Total rows dropped for any reason.
    #[must_use]
    pub const fn dropped_rows(&self) -> usize {
        self.dropped_invalid_date + self.dropped_invalid_arrest
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::InvalidDate => self.dropped_invalid_date += 1,
            DropReason::InvalidArrestFlag => self.dropped_invalid_arrest += 1,
        }
    }
}

/// Positions of the required columns within a header row.
struct ColumnIndex {
    date: usize,
    primary_type: usize,
    location_description: usize,
    arrest: usize,
    location: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &[String]) -> Result<Self, IngestError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| IngestError::MissingColumn {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            date: find(REQUIRED_COLUMNS[0])?,
            primary_type: find(REQUIRED_COLUMNS[1])?,
            location_description: find(REQUIRED_COLUMNS[2])?,
            arrest: find(REQUIRED_COLUMNS[3])?,
            location: find(REQUIRED_COLUMNS[4])?,
        })
    }
}

/// Loads and cleans an incident CSV from disk.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, is not valid CSV, or
/// lacks a required column.
pub fn load_incidents(path: &Path) -> Result<IngestReport, IngestError> {
    log::info!("Loading incidents from {}", path.display());
    let file = std::fs::File::open(path)?;
    let report = read_incidents(file)?;
    log::info!(
        "Loaded {} incidents ({} dropped, {} without coordinates)",
        report.records.len(),
        report.dropped_rows(),
        report.rows_without_coordinates
    );
    Ok(report)
}

/// Reads and cleans incident rows from any CSV reader.
///
/// # Errors
///
/// Returns [`IngestError`] if the input is not valid CSV or lacks a required
/// column.
pub fn read_incidents<R: Read>(reader: R) -> Result<IngestReport, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();
    let columns = ColumnIndex::from_headers(&headers)?;

    let mut report = IngestReport::default();

    for (row_number, result) in reader.records().enumerate() {
        let row = result?;

        match clean_row(&columns, &row) {
            Ok(record) => {
                if record.coordinates().is_none() {
                    report.rows_without_coordinates += 1;
                }
                report.records.push(record);
            }
            Err(reason) => {
                log::debug!("Dropping row {row_number}: {reason:?}");
                report.record_drop(reason);
            }
        }
    }

    if report.dropped_rows() > 0 {
        log::warn!(
            "Dropped {} rows ({} bad dates, {} bad arrest flags)",
            report.dropped_rows(),
            report.dropped_invalid_date,
            report.dropped_invalid_arrest
        );
    }

    Ok(report)
}

fn clean_row(columns: &ColumnIndex, row: &csv::StringRecord) -> Result<IncidentRecord, DropReason> {
    let cell = |i: usize| row.get(i).unwrap_or("");
    let occurred_at = parse_incident_date(cell(columns.date)).ok_or(DropReason::InvalidDate)?;
    let arrest = parse_arrest_flag(cell(columns.arrest)).ok_or(DropReason::InvalidArrestFlag)?;
    let coordinates = parse_location(cell(columns.location));

    Ok(IncidentRecord {
        occurred_at,
        primary_type: parse_category(cell(columns.primary_type)),
        location_description: parse_category(cell(columns.location_description)),
        arrest,
        latitude: coordinates.map(|(lat, _)| lat),
        longitude: coordinates.map(|(_, lng)| lng),
    })
}
