// MeterKPI CLI - Report generation
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Load a readings sheet and a configuration, run the engine and render the
//! report as JSON.

use meterkpi::{
    parse_timestamp, ConfigError, EngineConfig, KpiEngine, KpiReport, KpiRequest, Normalizer,
    RawReading,
};
use meterkpi_testdata::{Dataset, DatasetError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for one report run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Readings sheet exported as CSV.
    pub csv_path: PathBuf,
    /// Engine configuration file (JSON).
    pub config_path: Option<PathBuf>,
    /// Restrict to one location.
    pub location: Option<String>,
    /// Reference time for freshness.
    pub now: Option<String>,
    /// Add the estimated-days overlay.
    pub estimate_missing_days: bool,
    /// Requested shiftable load fraction.
    pub shiftable: Option<f64>,
    /// One report per location.
    pub per_location: bool,
    /// Indented JSON.
    pub pretty: bool,
}

/// Report output.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Single(KpiReport),
    PerLocation(BTreeMap<String, KpiReport>),
}

/// Load an engine configuration. Without a path the defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&json)?;
    config.validate()?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load raw rows, optionally keeping a single location.
///
/// Rows without a location belong to `default_location`.
pub fn load_rows(
    path: &Path,
    location: Option<&str>,
    default_location: &str,
) -> Result<Vec<RawReading>, CliError> {
    let dataset = Dataset::from_csv(path)?;
    info!("Loaded {} rows from {}", dataset.len(), path.display());

    let Some(wanted) = location else {
        return Ok(dataset.into_rows());
    };
    let rows: Vec<RawReading> = dataset
        .into_rows()
        .into_iter()
        .filter(|row| {
            let name = row
                .location
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default_location);
            name == wanted
        })
        .collect();

    if rows.is_empty() {
        return Err(CliError::UnknownLocation(wanted.to_string()));
    }
    debug!("{} rows for location {}", rows.len(), wanted);
    Ok(rows)
}

/// Build the request from the command-line options.
pub fn build_request(options: &RunOptions) -> Result<KpiRequest, CliError> {
    let mut request = KpiRequest::new().with_estimated_days(options.estimate_missing_days);
    if let Some(text) = &options.now {
        let now = parse_timestamp(text).ok_or_else(|| CliError::InvalidNow(text.clone()))?;
        request = request.with_now(now);
    }
    if let Some(fraction) = options.shiftable {
        request = request.with_shiftable_fraction(fraction);
    }
    Ok(request)
}

/// Run the engine for the options.
pub fn generate(options: &RunOptions) -> Result<Output, CliError> {
    let config = load_config(options.config_path.as_deref())?;
    let rows = load_rows(
        &options.csv_path,
        options.location.as_deref(),
        &config.sampling.default_location,
    )?;
    let request = build_request(options)?;
    let engine = KpiEngine::new(config)?;

    if options.per_location {
        let normalized = Normalizer::new(&engine.config().sampling).normalize(&rows);
        if !normalized.rejected.is_empty() {
            warn!("{} rows rejected during normalization", normalized.rejected.len());
        }
        return Ok(Output::PerLocation(
            engine.compute_per_location(&normalized.table, &request),
        ));
    }

    let report = engine.compute_raw(&rows, &request);
    if !report.rejected_rows.is_empty() {
        warn!("{} rows rejected during normalization", report.rejected_rows.len());
    }
    let unavailable = report.kpis.unavailable_keys();
    if !unavailable.is_empty() {
        debug!("Unavailable KPIs: {}", unavailable.join(", "));
    }
    Ok(Output::Single(report))
}

/// Run and render as JSON.
pub fn run(options: &RunOptions) -> Result<String, CliError> {
    let output = generate(options)?;
    let json = if options.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    Ok(json)
}

/// CLI errors.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid --now timestamp: {0}")]
    InvalidNow(String),

    #[error("No rows for location: {0}")]
    UnknownLocation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,location,ENERGY_KWH,kW_Total,Notes").unwrap();
        writeln!(file, "2025-01-06 08:00:00,Shed_01,1000.0,80.0,ok").unwrap();
        writeln!(file, "2025-01-06 08:05:00,Shed_01,1010.0,90.0,ok").unwrap();
        writeln!(file, "2025-01-06 08:00:00,Shed_02,500.0,40.0,").unwrap();
        writeln!(file, "2025-01-06 08:05:00,Shed_02,502.5,45.0,").unwrap();
        writeln!(file, "garbage,Shed_02,503.0,45.0,").unwrap();
        file.flush().unwrap();
        file
    }

    fn options(file: &NamedTempFile) -> RunOptions {
        RunOptions {
            csv_path: file.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_report() {
        let file = create_test_csv();
        let Output::Single(report) = generate(&options(&file)).unwrap() else {
            panic!("expected a single report");
        };
        assert_eq!(report.kpis.number("total_energy_kwh"), Some(12.5));
        assert_eq!(report.rejected_rows, vec![4]);
    }

    #[test]
    fn test_location_filter() {
        let file = create_test_csv();
        let mut opts = options(&file);
        opts.location = Some("Shed_02".to_string());
        let Output::Single(report) = generate(&opts).unwrap() else {
            panic!("expected a single report");
        };
        assert_eq!(report.kpis.number("total_energy_kwh"), Some(2.5));
        assert_eq!(report.kpis.count("locations"), Some(1));

        opts.location = Some("Shed_09".to_string());
        assert!(matches!(generate(&opts), Err(CliError::UnknownLocation(_))));
    }

    #[test]
    fn test_per_location_json() {
        let file = create_test_csv();
        let mut opts = options(&file);
        opts.per_location = true;
        let json: serde_json::Value = serde_json::from_str(&run(&opts).unwrap()).unwrap();
        assert_eq!(json["Shed_01"]["kpis"]["total_energy_kwh"], 10.0);
        assert_eq!(json["Shed_02"]["kpis"]["total_energy_kwh"], 2.5);
    }

    #[test]
    fn test_now_and_shiftable() {
        let file = create_test_csv();
        let mut opts = options(&file);
        opts.now = Some("2025-01-06 08:10:00".to_string());
        opts.shiftable = Some(0.9);
        let json: serde_json::Value = serde_json::from_str(&run(&opts).unwrap()).unwrap();
        assert_eq!(json["kpis"]["freshness"], "LIVE");
        assert_eq!(json["kpis"]["shiftable_fraction"], 0.6);

        opts.now = Some("tomorrow".to_string());
        assert!(matches!(run(&opts), Err(CliError::InvalidNow(_))));
    }

    #[test]
    fn test_missing_timestamp_column_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Location,Energy_kWh").unwrap();
        writeln!(file, "Shed_01,10.0").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            run(&options(&file)),
            Err(CliError::Dataset(DatasetError::MissingColumn(_)))
        ));
    }

    #[test]
    fn test_invalid_config_file() {
        let file = create_test_csv();
        let mut config = NamedTempFile::new().unwrap();
        writeln!(
            config,
            r#"{{ "fire_risk": {{ "watch_a": 10.0, "high_a": 5.0, "critical_a": 20.0 }} }}"#
        )
        .unwrap();
        config.flush().unwrap();

        let mut opts = options(&file);
        opts.config_path = Some(config.path().to_path_buf());
        assert!(matches!(run(&opts), Err(CliError::Config(_))));
    }

    #[test]
    fn test_default_config() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }
}
