// MeterKPI Testdata - Core generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Core dataset generation logic.
//!
//! Every sample draws the same number of random values whatever the
//! scenario, so two scenarios generated with one seed differ only where the
//! scenario injects its condition.

use crate::dataset::{Dataset, DatasetMetadata};
use crate::profile::{jitter, round3, tod_label, LoadProfile};
use crate::scenario::Scenario;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use meterkpi::{RawColumn, RawReading};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Timestamp layout written to the sheet.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// First sample time (facility local).
    pub start: NaiveDateTime,
    /// Minutes between samples of one location.
    pub interval_minutes: u32,
    /// Number of days to generate.
    pub days: u32,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Location names.
    pub locations: Vec<String>,
    /// Contracted demand per location (kW).
    pub contracted_kw: f64,
    /// Nominal line voltage (V).
    pub nominal_voltage_v: f64,
    /// Daily load shape.
    pub profile: LoadProfile,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 1, 6)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(), // Monday
            interval_minutes: 5,
            days: 7,
            seed: None,
            locations: vec!["Shed_01".to_string(), "Shed_02".to_string()],
            contracted_kw: 200.0,
            nominal_voltage_v: 415.0,
            profile: LoadProfile::default(),
        }
    }
}

impl GeneratorConfig {
    /// Create a new generator config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set first sample time.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    /// Set sample interval in minutes. Zero is raised to one.
    pub fn with_interval_minutes(mut self, minutes: u32) -> Self {
        self.interval_minutes = minutes.max(1);
        self
    }

    /// Set number of days.
    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set location names.
    pub fn with_locations<S: Into<String>>(mut self, locations: impl IntoIterator<Item = S>) -> Self {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Set contracted demand per location.
    pub fn with_contracted_kw(mut self, kw: f64) -> Self {
        self.contracted_kw = kw;
        self
    }

    /// Set load profile.
    pub fn with_profile(mut self, profile: LoadProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Samples per location per day.
    pub fn samples_per_day(&self) -> u32 {
        1440 / self.interval_minutes.max(1)
    }

    /// Samples per location over the whole window.
    pub fn samples_per_location(&self) -> usize {
        self.samples_per_day() as usize * self.days as usize
    }

    /// Time of the last sample.
    pub fn end(&self) -> NaiveDateTime {
        let n = self.samples_per_location().saturating_sub(1) as i64;
        self.start + Duration::minutes(n * i64::from(self.interval_minutes))
    }
}

/// One generated sample before formatting.
#[derive(Debug, Clone, Copy)]
struct Sample {
    kw: f64,
    counter_kwh: f64,
    pf: f64,
    currents: [f64; 3],
    neutral_a: f64,
    voltages: [f64; 3],
    frequency_hz: f64,
}

impl Sample {
    fn into_row(self, ts: NaiveDateTime, location: &str) -> RawReading {
        let total_current = self.currents.iter().sum::<f64>() / 3.0;
        RawReading::new(ts.format(TIMESTAMP_FORMAT).to_string(), location)
            .with(RawColumn::PowerKw, round3(self.kw))
            .with(RawColumn::EnergyKwh, round3(self.counter_kwh))
            .with(RawColumn::PowerFactor, round3(self.pf))
            .with(RawColumn::CurrentTotal, round3(total_current))
            .with(RawColumn::CurrentR, round3(self.currents[0]))
            .with(RawColumn::CurrentY, round3(self.currents[1]))
            .with(RawColumn::CurrentB, round3(self.currents[2]))
            .with(RawColumn::CurrentN, round3(self.neutral_a))
            .with(RawColumn::VoltageRy, round3(self.voltages[0]))
            .with(RawColumn::VoltageYb, round3(self.voltages[1]))
            .with(RawColumn::VoltageBr, round3(self.voltages[2]))
            .with(RawColumn::Frequency, round3(self.frequency_hz))
            .with_text(RawColumn::TodPeriod, tod_label(ts.hour()))
    }
}

/// Generate a dataset for a scenario.
pub fn generate_dataset(config: &GeneratorConfig, scenario: Scenario) -> Dataset {
    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut dataset = Dataset::new().with_metadata(DatasetMetadata {
        scenario: Some(scenario.name().to_string()),
        seed: config.seed,
        interval_minutes: Some(config.interval_minutes),
        days: Some(config.days),
    });

    let interval = i64::from(config.interval_minutes.max(1));
    let total = config.samples_per_location();
    let per_day = config.samples_per_day() as usize;
    let skipped_day = (scenario == Scenario::MissingDays && config.days >= 4).then_some(2);

    for (l, location) in config.locations.iter().enumerate() {
        let mut counter = 10_000.0 * (l as f64 + 1.0);

        for i in 0..total {
            let ts = config.start + Duration::minutes(i as i64 * interval);
            let sample = next_sample(config, scenario, &mut rng, ts, &mut counter, i == total / 2);

            if skipped_day == Some(i / per_day) {
                continue;
            }
            dataset.add_row(sample.into_row(ts, location));
        }
    }

    dataset
}

fn next_sample(
    config: &GeneratorConfig,
    scenario: Scenario,
    rng: &mut StdRng,
    ts: NaiveDateTime,
    counter: &mut f64,
    midpoint: bool,
) -> Sample {
    // Draw everything up front
    let load_noise = jitter(rng, 0.03);
    let pf_noise = jitter(rng, 0.008);
    let phase_noise = [jitter(rng, 0.02), jitter(rng, 0.02), jitter(rng, 0.02)];
    let voltage_noise = [jitter(rng, 1.5), jitter(rng, 1.5), jitter(rng, 1.5)];
    let frequency_noise = jitter(rng, 0.03);
    let neutral_idle: f64 = rng.gen_range(2.0..4.0);
    let neutral_overload: f64 = rng.gen_range(12.0..25.0);

    let (hour, minute) = (ts.hour(), ts.minute());

    let shutdown = scenario == Scenario::NightShutdown && !(6..22).contains(&hour);
    let kw = if shutdown {
        0.0
    } else {
        (config.contracted_kw * config.profile.load_share(ts) * (1.0 + load_noise)).max(0.0)
    };

    let pf = if scenario == Scenario::LowPowerFactor && hour == 14 && minute < 45 {
        (0.82 + pf_noise).clamp(0.78, 0.86)
    } else {
        (0.95 + pf_noise).clamp(0.93, 0.99)
    };

    *counter += kw * f64::from(config.interval_minutes) / 60.0;
    if scenario == Scenario::CounterReset && midpoint {
        *counter = 0.0;
    }

    let voltages = voltage_noise.map(|n| config.nominal_voltage_v + n);
    let mean_voltage = voltages.iter().sum::<f64>() / 3.0;
    let phase_current = if kw > 0.0 {
        kw * 1000.0 / (3.0_f64.sqrt() * mean_voltage * pf)
    } else {
        0.0
    };
    let currents = phase_noise.map(|n| (phase_current * (1.0 + n)).max(0.0));

    let neutral_a = if kw == 0.0 {
        0.0
    } else if scenario == Scenario::NeutralOverload && hour == 18 {
        neutral_overload
    } else {
        neutral_idle
    };

    Sample {
        kw,
        counter_kwh: *counter,
        pf,
        currents,
        neutral_a,
        voltages,
        frequency_hz: 50.0 + frequency_noise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GeneratorConfig {
        GeneratorConfig::new().with_days(2).with_seed(42)
    }

    #[test]
    fn test_generator_config_builder() {
        let config = GeneratorConfig::new()
            .with_interval_minutes(15)
            .with_days(3)
            .with_locations(["A"])
            .with_seed(1);
        assert_eq!(config.samples_per_day(), 96);
        assert_eq!(config.samples_per_location(), 288);
        assert_eq!(config.locations, vec!["A".to_string()]);
        assert_eq!(config.end().format(TIMESTAMP_FORMAT).to_string(), "2025-01-08 23:45:00");
    }

    #[test]
    fn test_zero_interval_is_raised() {
        assert_eq!(GeneratorConfig::new().with_interval_minutes(0).interval_minutes, 1);
    }

    #[test]
    fn test_row_count() {
        let dataset = generate_dataset(&config(), Scenario::Normal);
        assert_eq!(dataset.len(), 2 * 288 * 2);
        assert_eq!(dataset.locations(), vec!["Shed_01", "Shed_02"]);
        assert_eq!(dataset.metadata.scenario.as_deref(), Some("normal"));
    }

    #[test]
    fn test_reproducibility() {
        let a = generate_dataset(&config(), Scenario::Normal);
        let b = generate_dataset(&config(), Scenario::Normal);
        assert_eq!(a, b);
    }

    #[test]
    fn test_counter_is_monotonic_without_reset() {
        let dataset = generate_dataset(&config(), Scenario::Normal);
        let counters: Vec<f64> = dataset
            .for_location("Shed_01")
            .iter()
            .map(|r| r.energy_kwh.as_deref().unwrap().parse().unwrap())
            .collect();
        assert!(counters.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_tod_column_uses_sheet_labels() {
        let dataset = generate_dataset(&config(), Scenario::Normal);
        let labels: Vec<&str> = dataset.rows[..288]
            .iter()
            .map(|r| r.tod_period.as_deref().unwrap())
            .collect();
        assert_eq!(labels[0], "OFF-PEAK");
        assert_eq!(labels[6 * 12], "NORMAL");
        assert_eq!(labels[17 * 12], "PEAK");
        assert_eq!(labels[23 * 12], "OFF-PEAK");
    }

    #[test]
    fn test_missing_day_is_dropped() {
        let config = GeneratorConfig::new().with_days(4).with_locations(["A"]).with_seed(3);
        let dataset = generate_dataset(&config, Scenario::MissingDays);
        assert_eq!(dataset.len(), 3 * 288);
        assert!(dataset
            .rows
            .iter()
            .all(|r| !r.timestamp.as_deref().unwrap().starts_with("2025-01-08")));
    }

    #[test]
    fn test_night_shutdown_has_no_load() {
        let dataset = generate_dataset(&config(), Scenario::NightShutdown);
        let first = &dataset.rows[0];
        assert_eq!(first.power_kw.as_deref(), Some("0"));
        assert_eq!(first.current_total.as_deref(), Some("0"));
    }
}
