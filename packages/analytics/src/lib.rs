#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Descriptive statistics over cleaned incidents.
//!
//! Each function computes one chart's worth of data: feature correlations,
//! the daily arrest trend, the most common primary types and location
//! categories, and arrest rate by hour, weekday and month. Calendar buckets
//! come from the same [`TimeFeatures`] the models are trained on. Nothing
//! here draws; see the report crate for that.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use crime_risk_analytics_models::{
    ArrestRate, CategoryCount, CorrelationMatrix, DailyArrestRate, DescriptiveSummary,
    HourlyArrestRates,
};
use crime_risk_crime_models::{FEATURE_COUNT, FeatureVector, IncidentRecord};
use crime_risk_features::derive::{TimeFeatures, split_location_description};
use ndarray::{Array2, Axis};

/// How many primary types the frequency chart shows.
pub const TOP_TYPE_COUNT: usize = 10;

/// How many location categories the frequency chart shows.
pub const TOP_LOCATION_CATEGORY_COUNT: usize = 10;

/// Pearson correlation between the five feature columns.
///
/// Fewer than two rows, or a constant column, yields zeros for the affected
/// entries.
#[must_use]
#[allow(clippy::needless_range_loop)]
pub fn feature_correlation(features: &[FeatureVector]) -> CorrelationMatrix {
    let mut values = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
    if features.len() < 2 {
        return CorrelationMatrix { values };
    }

    let rows: Vec<f64> = features.iter().flat_map(FeatureVector::to_row).collect();
    let Ok(x) = Array2::from_shape_vec((features.len(), FEATURE_COUNT), rows) else {
        return CorrelationMatrix { values };
    };
    let Some(mean) = x.mean_axis(Axis(0)) else {
        return CorrelationMatrix { values };
    };
    let centered = &x - &mean;
    let covariance = centered.t().dot(&centered);

    for a in 0..FEATURE_COUNT {
        for b in 0..FEATURE_COUNT {
            let denom = (covariance[[a, a]] * covariance[[b, b]]).sqrt();
            values[a][b] = if denom > 0.0 {
                (covariance[[a, b]] / denom).clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
    }
    CorrelationMatrix { values }
}

/// Arrest rate per calendar day, oldest first.
#[must_use]
pub fn daily_arrest_rates(records: &[IncidentRecord]) -> Vec<DailyArrestRate> {
    let mut by_day: BTreeMap<NaiveDate, ArrestRate> = BTreeMap::new();
    for record in records {
        let entry = by_day.entry(record.occurred_at.date()).or_default();
        entry.incidents += 1;
        entry.arrests += u64::from(record.arrest);
    }
    by_day
        .into_iter()
        .map(|(date, rate)| DailyArrestRate { date, rate })
        .collect()
}

/// The `limit` most frequent primary types.
///
/// Records without a primary type are not counted. Equal counts are ordered
/// by name.
#[must_use]
pub fn top_primary_types(records: &[IncidentRecord], limit: usize) -> Vec<CategoryCount> {
    rank(records.iter().filter_map(|r| r.primary_type.clone()), limit)
}

/// The `limit` most frequent location categories, i.e. the first word of
/// each location description (`"PARKING"` for `"PARKING LOT / GARAGE"`).
///
/// Ranked like [`top_primary_types`].
#[must_use]
pub fn top_location_categories(records: &[IncidentRecord], limit: usize) -> Vec<CategoryCount> {
    rank(
        records
            .iter()
            .filter_map(|r| r.location_description.as_deref())
            .filter_map(|d| split_location_description(d).category),
        limit,
    )
}

fn rank(values: impl Iterator<Item = String>, limit: usize) -> Vec<CategoryCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let mut ranked: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    ranked.truncate(limit);
    ranked
}

fn tally(bucket: &mut ArrestRate, arrest: bool) {
    bucket.incidents += 1;
    bucket.arrests += u64::from(arrest);
}

/// Arrest rate for each hour of the day.
#[must_use]
pub fn hourly_arrest_rates(records: &[IncidentRecord]) -> HourlyArrestRates {
    let mut rates = HourlyArrestRates::default();
    for record in records {
        let time = TimeFeatures::from_timestamp(&record.occurred_at);
        tally(&mut rates.hours[time.hour as usize], record.arrest);
    }
    rates
}

/// Arrest rate for each day of the week, Monday first.
#[must_use]
pub fn weekday_arrest_rates(records: &[IncidentRecord]) -> [ArrestRate; 7] {
    let mut rates = [ArrestRate::default(); 7];
    for record in records {
        let time = TimeFeatures::from_timestamp(&record.occurred_at);
        tally(&mut rates[time.day_of_week as usize], record.arrest);
    }
    rates
}

/// Arrest rate for each calendar month, January first.
#[must_use]
pub fn monthly_arrest_rates(records: &[IncidentRecord]) -> [ArrestRate; 12] {
    let mut rates = [ArrestRate::default(); 12];
    for record in records {
        let time = TimeFeatures::from_timestamp(&record.occurred_at);
        tally(&mut rates[time.month as usize - 1], record.arrest);
    }
    rates
}

/// Computes every descriptive statistic in one pass over the inputs.
#[must_use]
pub fn describe(records: &[IncidentRecord], features: &[FeatureVector]) -> DescriptiveSummary {
    let summary = DescriptiveSummary {
        correlation: feature_correlation(features),
        daily_arrests: daily_arrest_rates(records),
        top_types: top_primary_types(records, TOP_TYPE_COUNT),
        top_location_categories: top_location_categories(records, TOP_LOCATION_CATEGORY_COUNT),
        hourly_arrests: hourly_arrest_rates(records),
        weekday_arrests: weekday_arrest_rates(records),
        monthly_arrests: monthly_arrest_rates(records),
    };
    log::debug!(
        "Described {} incidents over {} days",
        records.len(),
        summary.daily_arrests.len()
    );
    summary
}
