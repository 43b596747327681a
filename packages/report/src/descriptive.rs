//! Charts of descriptive incident statistics.

use std::path::Path;

use crime_risk_analytics_models::{
    ArrestRate, CategoryCount, CorrelationMatrix, DailyArrestRate, HourlyArrestRates,
};
use crime_risk_crime_models::FEATURE_COUNT;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::{FONT_FAMILY, ReportError, coolwarm, ensure_font, series_color, slot_end};

/// Annotated heatmap of the feature correlation matrix.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn correlation_heatmap(path: &Path, matrix: &CorrelationMatrix) -> Result<(), ReportError> {
    ensure_font()?;
    let labels = CorrelationMatrix::labels();
    let n = FEATURE_COUNT;

    let root = BitMapBackend::new(path, (800, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Correlation Heatmap", (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(130)
        .build_cartesian_2d(
            (0..slot_end(n)).into_segmented(),
            (0..slot_end(n)).into_segmented(),
        )?;

    let column_label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    let row_label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(slot) if *slot < n => labels[n - 1 - slot].clone(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&column_label)
        .y_label_formatter(&row_label)
        .x_label_style((FONT_FAMILY, 12))
        .draw()?;

    for (row, values) in matrix.values.iter().enumerate() {
        let slot = n - 1 - row;
        for (column, &value) in values.iter().enumerate() {
            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(column), SegmentValue::Exact(slot)),
                    (SegmentValue::Exact(column + 1), SegmentValue::Exact(slot + 1)),
                ],
                coolwarm(value).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{value:.2}"),
                (SegmentValue::CenterOf(column), SegmentValue::CenterOf(slot)),
                (FONT_FAMILY, 16)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Line chart of the arrest rate per day.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn arrest_trend(path: &Path, daily: &[DailyArrestRate]) -> Result<(), ReportError> {
    ensure_font()?;
    let root = BitMapBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Daily Arrest Rate", (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(0..slot_end(daily.len()), 0f64..1f64)?;

    let date_label = |i: &usize| {
        daily
            .get(*i)
            .map(|d| d.date.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .x_labels(daily.len().clamp(2, 10))
        .x_label_formatter(&date_label)
        .x_desc("Date")
        .y_desc("Arrest rate")
        .draw()?;

    let points: Vec<(usize, f64)> = daily
        .iter()
        .enumerate()
        .map(|(i, d)| (i, d.rate.rate()))
        .collect();
    let color = series_color(0);
    chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?;
    chart.draw_series(
        points
            .iter()
            .map(|&point| Circle::new(point, 3, color.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Horizontal bars of the most frequent primary types, largest on top.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn crime_types(path: &Path, top: &[CategoryCount]) -> Result<(), ReportError> {
    ranked_bars(path, "Top Crime Types", top, series_color(1))
}

/// Horizontal bars of the most frequent location categories, largest on top.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn location_categories(path: &Path, top: &[CategoryCount]) -> Result<(), ReportError> {
    ranked_bars(path, "Top Location Categories", top, series_color(3))
}

#[allow(clippy::cast_precision_loss)]
fn ranked_bars(
    path: &Path,
    caption: &str,
    top: &[CategoryCount],
    color: RGBColor,
) -> Result<(), ReportError> {
    ensure_font()?;
    let n = top.len();
    let max = top.iter().map(|c| c.count).max().unwrap_or(0).max(1) as f64;

    let root = BitMapBackend::new(path, (900, 550)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(220)
        .build_cartesian_2d(0f64..max * 1.1, (0..slot_end(n)).into_segmented())?;

    let label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(slot) if *slot < n => top[n - 1 - slot].category.clone(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n.max(1))
        .y_label_formatter(&label)
        .y_label_style((FONT_FAMILY, 12))
        .x_desc("Incidents")
        .draw()?;

    chart.draw_series(top.iter().enumerate().map(|(rank, category)| {
        let slot = n - 1 - rank;
        let mut bar = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(slot)),
                (category.count as f64, SegmentValue::Exact(slot + 1)),
            ],
            color.filled(),
        );
        bar.set_margin(4, 4, 0, 0);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Bar per hour of day.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn hourly_arrest_rate(path: &Path, hourly: &HourlyArrestRates) -> Result<(), ReportError> {
    let labels: Vec<String> = (0..hourly.hours.len()).map(|h| h.to_string()).collect();
    rate_bars(
        path,
        "Arrest Rate by Hour",
        "Hour of day",
        &labels,
        &hourly.hours,
        series_color(2),
    )
}

/// Bar per day of the week, Monday first.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn weekday_arrest_rate(path: &Path, weekdays: &[ArrestRate; 7]) -> Result<(), ReportError> {
    let labels = WEEKDAY_LABELS.map(ToString::to_string);
    rate_bars(
        path,
        "Arrest Rate by Weekday",
        "Day of week",
        &labels,
        weekdays,
        series_color(4),
    )
}

/// Bar per calendar month, January first.
///
/// # Errors
///
/// Returns [`ReportError`] if the image cannot be drawn.
pub fn monthly_arrest_rate(path: &Path, months: &[ArrestRate; 12]) -> Result<(), ReportError> {
    let labels = MONTH_LABELS.map(ToString::to_string);
    rate_bars(
        path,
        "Arrest Rate by Month",
        "Month",
        &labels,
        months,
        series_color(0),
    )
}

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn rate_bars(
    path: &Path,
    caption: &str,
    x_desc: &str,
    labels: &[String],
    rates: &[ArrestRate],
    color: RGBColor,
) -> Result<(), ReportError> {
    ensure_font()?;
    let n = rates.len();
    let peak = rates.iter().map(ArrestRate::rate).fold(0.0_f64, f64::max);

    let root = BitMapBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (FONT_FAMILY, 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(
            (0..slot_end(n)).into_segmented(),
            0f64..(peak * 1.1).max(0.05),
        )?;

    let bucket_label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.max(1))
        .x_label_formatter(&bucket_label)
        .x_desc(x_desc)
        .y_desc("Arrest rate")
        .draw()?;

    chart.draw_series(rates.iter().enumerate().map(|(i, bucket)| {
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), bucket.rate()),
            ],
            color.filled(),
        );
        bar.set_margin(0, 0, 3, 3);
        bar
    }))?;

    root.present()?;
    Ok(())
}
