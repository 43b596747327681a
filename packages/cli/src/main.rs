#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crime-risk toolchain.
//!
//! With no subcommand the full training pipeline runs with the embedded
//! default configuration. The lookup subcommands (`score`, `advice`,
//! `path-risk`) answer single questions from a saved model or the incident
//! CSV.
//!
//! Log output goes through [`crime_risk_cli_utils::init_logger`] so it does
//! not tear the progress bars.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crime_risk_cli_utils::IndicatifProgress;
use crime_risk_ingest::parsing::parse_incident_date;
use crime_risk_pipeline::{
    ModelArtifact, PipelineConfig, PipelineProgress, PipelineSummary, STEP_COUNT, load_index,
    score_incident,
};
use crime_risk_spatial::GeoPoint;

#[derive(Parser)]
#[command(
    name = "crime_risk",
    about = "Arrest-risk modelling and hotspot analysis for crime incident exports"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline (the default)
    Train(TrainArgs),
    /// Predict the arrest probability of one incident with a saved model
    Score {
        /// Model artifact written by `train`
        #[arg(long, default_value = "risk_model.msgpack")]
        artifact: PathBuf,
        /// When the incident occurred, e.g. `2024-05-01T23:30:00`
        #[arg(long)]
        at: String,
        /// Location description, e.g. `STREET`
        #[arg(long)]
        location: Option<String>,
        /// Primary crime type, e.g. `NARCOTICS`
        #[arg(long = "type")]
        primary_type: Option<String>,
    },
    /// Incidents near a point during one hour of the day
    Advice {
        #[arg(long, default_value = "Crimes_Last_7_Days.csv")]
        input: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: u32,
    },
    /// Average incident density along a sequence of waypoints
    PathRisk {
        #[arg(long, default_value = "Crimes_Last_7_Days.csv")]
        input: PathBuf,
        /// `lat,lon`; repeat for each waypoint in order
        #[arg(long = "waypoint", required = true, allow_hyphen_values = true, value_parser = parse_waypoint)]
        waypoints: Vec<GeoPoint>,
    },
}

#[derive(Args, Default)]
struct TrainArgs {
    /// TOML file replacing the embedded configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Incident CSV, overriding the configuration
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output directory, overriding the configuration
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn parse_waypoint(s: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lon`, got {s:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("bad longitude {lon:?}: {e}"))?;
    Ok(GeoPoint::new(lat, lon))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = crime_risk_cli_utils::init_logger();

    match cli.command.unwrap_or_else(|| Commands::Train(TrainArgs::default())) {
        Commands::Train(args) => train(&multi, args)?,
        Commands::Score {
            artifact,
            at,
            location,
            primary_type,
        } => {
            let artifact = ModelArtifact::load(&artifact)?;
            let occurred_at =
                parse_incident_date(&at).ok_or_else(|| format!("unreadable timestamp {at:?}"))?;
            let probability = score_incident(
                &artifact,
                &occurred_at,
                location.as_deref(),
                primary_type.as_deref(),
            )?;
            println!(
                "{} arrest probability: {probability:.3}",
                artifact.kind().display_name()
            );
        }
        Commands::Advice {
            input,
            lat,
            lon,
            hour,
        } => {
            let index = load_index(&input)?;
            log::debug!("Indexed {} incidents with coordinates", index.len());
            let advice = index.area_advice(GeoPoint::new(lat, lon), hour);
            println!("Incidents near ({lat}, {lon}) at {hour:02}:00: {}", advice.total);
            match advice.top_type {
                Some(top) => println!("Most common: {top}"),
                None => println!("No incidents recorded at this hour"),
            }
        }
        Commands::PathRisk { input, waypoints } => {
            let index = load_index(&input)?;
            if let Some(risk) = index.path_risk(&waypoints) {
                for (point, count) in waypoints.iter().zip(&risk.counts) {
                    println!("({}, {}): {count}", point.latitude, point.longitude);
                }
                println!("Average {:.2} incidents per waypoint: {} risk", risk.average, risk.level);
            }
        }
    }

    Ok(())
}

fn train(
    multi: &crime_risk_cli_utils::MultiProgress,
    args: TrainArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::embedded()?,
    };
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    log::debug!("Running with {config:?}");

    let progress = PipelineProgress {
        steps: IndicatifProgress::steps_bar(multi, "Pipeline", STEP_COUNT),
        training: IndicatifProgress::fits_bar(multi, "Cross-validation"),
    };
    let summary = crime_risk_pipeline::run(&config, &progress)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &PipelineSummary) {
    println!();
    println!(
        "{} incidents ({} dropped); {} train rows ({} after SMOTE), {} test rows",
        summary.incidents,
        summary.dropped_rows,
        summary.train_rows,
        summary.resampled_rows,
        summary.test_rows
    );
    println!();
    println!(
        "{:<16} {:>16} {:>9} {:>9} {:>9} {:>9}",
        "Model", "CV F1", "Accuracy", "Precision", "Recall", "F1"
    );
    for model in &summary.models {
        let m = &model.evaluation.metrics;
        println!(
            "{:<16} {:>16} {:>9.3} {:>9.3} {:>9.3} {:>9.3}",
            model.kind.display_name(),
            format!("{:.3} +/- {:.3}", model.cv_mean, model.cv_std * 2.0),
            m.accuracy,
            m.precision,
            m.recall,
            m.f1
        );
    }
    for failure in &summary.failures {
        println!("{:<16} failed: {}", failure.kind.display_name(), failure.error);
    }
    if let Some(best) = summary.best_model() {
        println!();
        println!("Best model: {} ({})", best.kind.display_name(), best.params);
    }

    println!();
    println!(
        "{} clusters, {} noise points",
        summary.clusters, summary.noise_points
    );
    for path in summary.charts.iter().chain(&summary.map).chain(&summary.artifact) {
        println!("Wrote {}", path.display());
    }
    for path in &summary.failed_charts {
        println!("Failed {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_means_train() {
        let cli = Cli::try_parse_from(["crime_risk"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_negative_waypoints() {
        let cli = Cli::try_parse_from([
            "crime_risk",
            "path-risk",
            "--waypoint",
            "41.88,-87.63",
            "--waypoint",
            "41.89,-87.62",
        ])
        .unwrap();
        let Some(Commands::PathRisk { waypoints, .. }) = cli.command else {
            panic!("expected path-risk");
        };
        assert_eq!(waypoints, vec![GeoPoint::new(41.88, -87.63), GeoPoint::new(41.89, -87.62)]);
        assert!(parse_waypoint("41.88").is_err());
    }

    #[test]
    fn advice_accepts_negative_longitude() {
        let cli = Cli::try_parse_from([
            "crime_risk", "advice", "--lat", "41.88", "--lon", "-87.63", "--hour", "23",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Advice { hour: 23, .. })));
        assert!(
            Cli::try_parse_from([
                "crime_risk", "advice", "--lat", "41.88", "--lon", "-87.63", "--hour", "24",
            ])
            .is_err()
        );
    }
}
