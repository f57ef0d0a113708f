// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Power quality analysis
//!
//! Power factor is only meaningful while the load draws real current, so every
//! PF statistic runs over the *valid* readings: `current_total` above the
//! configured minimum and a PF value present. Readings at startup or idle
//! report a spurious PF and are dropped here.
//!
//! Sustained events are maximal runs of consecutive valid readings, per
//! location, with `|pf|` below the sustained threshold. Short dips are noise;
//! only runs reaching the minimum length count as alerts.

use crate::config::PowerQualityConfig;
use crate::error::{Field, KpiError, Result};
use crate::reading::{Reading, ReadingTable, ThreePhase};
use crate::stats;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Maintenance level derived from the sustained-alert count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    /// No sustained alerts
    Healthy,
    /// A few sustained alerts
    Monitor,
    /// More alerts than the monitor band allows
    ServiceNeeded,
}

impl AlertLevel {
    /// Lookup from the alert count. `monitor_max` is the last count still
    /// classified as [`AlertLevel::Monitor`].
    pub fn from_alerts(alerts: usize, monitor_max: usize) -> Self {
        match alerts {
            0 => Self::Healthy,
            n if n <= monitor_max => Self::Monitor,
            _ => Self::ServiceNeeded,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Monitor => "MONITOR",
            Self::ServiceNeeded => "SERVICE_NEEDED",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// PF distribution over valid readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PfStats {
    pub valid_readings: usize,
    pub avg: f64,
    pub min: f64,
    /// Share of valid readings below the warning threshold (%)
    pub below_warning_pct: f64,
    /// Share of valid readings below the alert threshold (%)
    pub below_alert_pct: f64,
}

/// One sustained low-PF episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PfEvent {
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub readings: usize,
    /// Reading count times the sampling interval
    pub duration_minutes: f64,
    pub min_pf: f64,
    pub avg_pf: f64,
}

/// Sustained-event summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SustainedSummary {
    /// Qualifying events, ordered by start time
    pub events: Vec<PfEvent>,
    /// Minutes across qualifying events only
    pub minutes: f64,
    pub level: AlertLevel,
}

impl SustainedSummary {
    /// Number of qualifying runs
    pub fn alerts(&self) -> usize {
        self.events.len()
    }
}

/// Worst, mean and warning count of a per-reading imbalance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImbalanceStats {
    pub readings: usize,
    pub max_pct: f64,
    pub avg_pct: f64,
    /// Readings strictly above the warning threshold
    pub warnings: usize,
}

impl ImbalanceStats {
    fn from_values(values: &[f64], warning_pct: f64) -> Option<Self> {
        Some(Self {
            readings: values.len(),
            max_pct: stats::max(values)?,
            avg_pct: stats::mean(values)?,
            warnings: values.iter().filter(|v| **v > warning_pct).count(),
        })
    }
}

/// Line voltage quality relative to nominal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageStats {
    pub imbalance: ImbalanceStats,
    /// Largest |v - nominal| / nominal over all lines and readings (%)
    pub deviation_max_pct: f64,
}

/// Grid frequency extremes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyStats {
    pub readings: usize,
    pub min_hz: f64,
    pub max_hz: f64,
    /// Readings outside the normal band
    pub out_of_band: usize,
}

/// Everything the analyzer produces for one table. Each part fails on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerQualityReport {
    pub pf: Result<PfStats>,
    pub sustained: Result<SustainedSummary>,
    pub current_imbalance: Result<ImbalanceStats>,
    pub voltage: Result<VoltageStats>,
    pub frequency: Result<FrequencyStats>,
}

/// Current imbalance of one reading: `(max - min) / mean * 100`.
///
/// `None` when the mean is zero.
pub fn current_imbalance_pct(phases: &ThreePhase) -> Option<f64> {
    let mean = phases.mean();
    if mean == 0.0 {
        return None;
    }
    Some((phases.max() - phases.min()) / mean * 100.0)
}

/// Voltage imbalance of one reading: `(max - min) / nominal * 100`.
pub fn voltage_imbalance_pct(lines: &ThreePhase, nominal_v: f64) -> f64 {
    (lines.max() - lines.min()) / nominal_v * 100.0
}

/// Largest deviation of any line from nominal (%).
pub fn voltage_deviation_pct(lines: &ThreePhase, nominal_v: f64) -> f64 {
    lines
        .values()
        .iter()
        .map(|v| (v - nominal_v).abs() / nominal_v * 100.0)
        .fold(0.0, f64::max)
}

/// Power quality analyzer
#[derive(Debug, Clone)]
pub struct PowerQualityAnalyzer {
    config: PowerQualityConfig,
    interval_minutes: f64,
}

impl Default for PowerQualityAnalyzer {
    fn default() -> Self {
        Self::new(&PowerQualityConfig::default(), 5)
    }
}

impl PowerQualityAnalyzer {
    pub fn new(config: &PowerQualityConfig, interval_minutes: u32) -> Self {
        Self {
            config: config.clone(),
            interval_minutes: f64::from(interval_minutes),
        }
    }

    /// Run every analysis.
    pub fn analyze(&self, table: &ReadingTable) -> PowerQualityReport {
        PowerQualityReport {
            pf: self.pf_stats(table),
            sustained: self.sustained_events(table),
            current_imbalance: self.current_imbalance(table),
            voltage: self.voltage(table),
            frequency: self.frequency(table),
        }
    }

    /// PF of a reading when it passes the validity filter.
    pub fn valid_pf(&self, reading: &Reading) -> Option<f64> {
        let current = reading.current_total?;
        if current > self.config.min_valid_current_a {
            reading.pf_abs()
        } else {
            None
        }
    }

    /// Distribution of `|pf|` over valid readings.
    pub fn pf_stats(&self, table: &ReadingTable) -> Result<PfStats> {
        let values: Vec<f64> = table.iter().filter_map(|r| self.valid_pf(r)).collect();
        let (Some(avg), Some(min)) = (stats::mean(&values), stats::min(&values)) else {
            return Err(KpiError::insufficient("power_factor", 1, 0));
        };
        Ok(PfStats {
            valid_readings: values.len(),
            avg,
            min,
            below_warning_pct: stats::pct_below(&values, self.config.pf_warning).unwrap_or(0.0),
            below_alert_pct: stats::pct_below(&values, self.config.pf_alert).unwrap_or(0.0),
        })
    }

    /// Sustained low-PF runs over the valid readings of each location.
    pub fn sustained_events(&self, table: &ReadingTable) -> Result<SustainedSummary> {
        let mut events = Vec::new();
        let mut any_valid = false;

        for (location, readings) in table.by_location() {
            let mut run: Vec<(NaiveDateTime, f64)> = Vec::new();
            for reading in readings {
                let Some(pf) = self.valid_pf(reading) else {
                    continue;
                };
                any_valid = true;
                if pf < self.config.sustained_threshold {
                    run.push((reading.timestamp, pf));
                } else {
                    self.close_run(location, &mut run, &mut events);
                }
            }
            self.close_run(location, &mut run, &mut events);
        }

        if !any_valid {
            return Err(KpiError::insufficient("power_factor", 1, 0));
        }

        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.location.cmp(&b.location)));
        let minutes = events.iter().map(|e| e.duration_minutes).sum();
        let level = AlertLevel::from_alerts(events.len(), self.config.monitor_max_alerts);
        Ok(SustainedSummary {
            events,
            minutes,
            level,
        })
    }

    fn close_run(
        &self,
        location: &str,
        run: &mut Vec<(NaiveDateTime, f64)>,
        events: &mut Vec<PfEvent>,
    ) {
        if run.len() >= self.config.sustained_min_readings {
            let pfs: Vec<f64> = run.iter().map(|(_, pf)| *pf).collect();
            if let (Some(first), Some(last), Some(min_pf), Some(avg_pf)) =
                (run.first(), run.last(), stats::min(&pfs), stats::mean(&pfs))
            {
                events.push(PfEvent {
                    location: location.to_string(),
                    start: first.0,
                    end: last.0,
                    readings: run.len(),
                    duration_minutes: run.len() as f64 * self.interval_minutes,
                    min_pf,
                    avg_pf,
                });
            }
        }
        run.clear();
    }

    /// Phase-current imbalance over readings carrying all three phases.
    pub fn current_imbalance(&self, table: &ReadingTable) -> Result<ImbalanceStats> {
        let phases: Vec<&ThreePhase> = table.iter().filter_map(|r| r.phase_currents.as_ref()).collect();
        if phases.is_empty() {
            return Err(KpiError::MissingField(Field::PhaseCurrents));
        }
        let values: Vec<f64> = phases.into_iter().filter_map(current_imbalance_pct).collect();
        ImbalanceStats::from_values(&values, self.config.current_imbalance_warning_pct)
            .ok_or_else(|| KpiError::insufficient("current_imbalance", 1, 0))
    }

    /// Line-voltage imbalance and deviation from nominal.
    pub fn voltage(&self, table: &ReadingTable) -> Result<VoltageStats> {
        let nominal = self.config.nominal_voltage_v;
        let lines: Vec<&ThreePhase> = table.iter().filter_map(|r| r.line_voltages.as_ref()).collect();
        let imbalances: Vec<f64> = lines.iter().map(|l| voltage_imbalance_pct(l, nominal)).collect();
        let deviations: Vec<f64> = lines.iter().map(|l| voltage_deviation_pct(l, nominal)).collect();

        match (
            ImbalanceStats::from_values(&imbalances, self.config.voltage_imbalance_warning_pct),
            stats::max(&deviations),
        ) {
            (Some(imbalance), Some(deviation_max_pct)) => Ok(VoltageStats {
                imbalance,
                deviation_max_pct,
            }),
            _ => Err(KpiError::MissingField(Field::LineVoltages)),
        }
    }

    /// Frequency extremes and out-of-band count.
    pub fn frequency(&self, table: &ReadingTable) -> Result<FrequencyStats> {
        let values: Vec<f64> = table.iter().filter_map(|r| r.frequency).collect();
        let (Some(min_hz), Some(max_hz)) = (stats::min(&values), stats::max(&values)) else {
            return Err(KpiError::MissingField(Field::Frequency));
        };
        let (low, high) = (self.config.frequency_low_hz, self.config.frequency_high_hz);
        Ok(FrequencyStats {
            readings: values.len(),
            min_hz,
            max_hz,
            out_of_band: values.iter().filter(|f| **f < low || **f > high).count(),
        })
    }
}
