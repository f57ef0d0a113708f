// MeterKPI CLI - KPI reports from meter reading sheets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # MeterKPI CLI
//!
//! Computes the KPI report for a readings sheet exported as CSV and prints
//! it as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Whole sheet, default configuration
//! meterkpi --csv readings.csv --pretty
//!
//! # One shed, with freshness and the estimated-days overlay
//! meterkpi --csv readings.csv --location Shed_01 \
//!     --now "2025-01-13 09:00:00" --estimate-missing-days
//!
//! # Site-specific thresholds, one report per location
//! meterkpi --csv readings.csv --config site.json --per-location
//! ```

mod report;

use clap::Parser;
use report::{run, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// MeterKPI report generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Readings sheet exported as CSV
    #[arg(short, long)]
    csv: PathBuf,

    /// Engine configuration (JSON). Missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only analyze this location
    #[arg(short, long)]
    location: Option<String>,

    /// Reference time for freshness, e.g. "2025-01-13 09:00:00"
    #[arg(long)]
    now: Option<String>,

    /// Add display-only estimates for days without readings
    #[arg(long)]
    estimate_missing_days: bool,

    /// Shiftable load fraction for the ToD plan (clamped to the configured bounds)
    #[arg(long)]
    shiftable: Option<f64>,

    /// Emit one report per location
    #[arg(long)]
    per_location: bool,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl From<Args> for RunOptions {
    fn from(args: Args) -> Self {
        Self {
            csv_path: args.csv,
            config_path: args.config,
            location: args.location,
            now: args.now,
            estimate_missing_days: args.estimate_missing_days,
            shiftable: args.shiftable,
            per_location: args.per_location,
            pretty: args.pretty,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr, the report to stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("MeterKPI v{}", meterkpi::VERSION);

    match run(&RunOptions::from(args)) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "meterkpi",
            "--csv",
            "readings.csv",
            "--location",
            "Shed_01",
            "--shiftable",
            "0.4",
            "--estimate-missing-days",
            "--per-location",
        ]);
        let options = RunOptions::from(args);
        assert_eq!(options.csv_path, PathBuf::from("readings.csv"));
        assert_eq!(options.location.as_deref(), Some("Shed_01"));
        assert_eq!(options.shiftable, Some(0.4));
        assert!(options.estimate_missing_days);
        assert!(options.per_location);
        assert!(!options.pretty);
    }

    #[test]
    fn test_csv_is_required() {
        assert!(Args::try_parse_from(["meterkpi"]).is_err());
    }
}
