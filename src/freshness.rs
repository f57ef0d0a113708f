// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Data freshness
//!
//! Stateless three-state classification of how recent the latest reading is.
//! The caller supplies "now"; the engine never reads the clock. A latest
//! reading in the future of "now" counts as zero elapsed minutes.

use crate::config::{FreshnessConfig, SamplingConfig};
use crate::error::{KpiError, Result};
use crate::reading::ReadingTable;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Recency of the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FreshnessState {
    Live,
    Delayed,
    Offline,
}

impl FreshnessState {
    /// State for the elapsed minutes since the latest reading
    pub fn classify(elapsed_minutes: f64, config: &FreshnessConfig) -> Self {
        if elapsed_minutes <= config.live_max_minutes {
            Self::Live
        } else if elapsed_minutes <= config.delayed_max_minutes {
            Self::Delayed
        } else {
            Self::Offline
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Live => "LIVE",
            Self::Delayed => "DELAYED",
            Self::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for FreshnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Freshness of one timestamp against "now"
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Freshness {
    pub state: FreshnessState,
    pub latest: NaiveDateTime,
    pub minutes_since_last: f64,
}

/// Feed status of one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStatus {
    pub location: String,
    pub readings: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    /// Present when "now" was supplied
    pub freshness: Option<Freshness>,
    /// Intervals longer than expected interval plus tolerance
    pub gaps: usize,
    /// `normal_intervals / (n - 1) * 100`; absent for a single reading
    pub uptime_pct: Option<f64>,
}

/// Freshness monitor
#[derive(Debug, Clone, Default)]
pub struct FreshnessMonitor {
    config: FreshnessConfig,
    sampling: SamplingConfig,
}

impl FreshnessMonitor {
    pub fn new(config: &FreshnessConfig, sampling: &SamplingConfig) -> Self {
        Self {
            config: config.clone(),
            sampling: sampling.clone(),
        }
    }

    /// Classify a latest timestamp against "now"
    pub fn assess(&self, latest: NaiveDateTime, now: NaiveDateTime) -> Freshness {
        let elapsed = (now - latest).num_seconds().max(0) as f64 / 60.0;
        Freshness {
            state: FreshnessState::classify(elapsed, &self.config),
            latest,
            minutes_since_last: elapsed,
        }
    }

    /// Freshness of the table's latest reading
    pub fn table(&self, table: &ReadingTable, now: NaiveDateTime) -> Result<Freshness> {
        let latest = table
            .latest_timestamp()
            .ok_or_else(|| KpiError::insufficient("freshness", 1, 0))?;
        Ok(self.assess(latest, now))
    }

    /// Status of every location, sorted by name
    pub fn locations(&self, table: &ReadingTable, now: Option<NaiveDateTime>) -> Vec<LocationStatus> {
        let max_gap_seconds = i64::from(
            self.sampling
                .interval_minutes
                .saturating_add(self.sampling.gap_tolerance_minutes),
        ) * 60;

        table
            .by_location()
            .into_iter()
            .filter_map(|(location, readings)| {
                let first = readings.first()?.timestamp;
                let last = readings.last()?.timestamp;
                let intervals: Vec<i64> = readings
                    .windows(2)
                    .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
                    .collect();
                let gaps = intervals.iter().filter(|s| **s > max_gap_seconds).count();
                let uptime_pct = (!intervals.is_empty())
                    .then(|| (intervals.len() - gaps) as f64 / intervals.len() as f64 * 100.0);

                Some(LocationStatus {
                    location: location.to_string(),
                    readings: readings.len(),
                    first,
                    last,
                    freshness: now.map(|now| self.assess(last, now)),
                    gaps,
                    uptime_pct,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;
    use chrono::{Duration, NaiveDate};

    fn t(min: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + Duration::minutes(min)
    }

    #[test]
    fn test_state_boundaries() {
        let config = FreshnessConfig::default();
        assert_eq!(FreshnessState::classify(0.0, &config), FreshnessState::Live);
        assert_eq!(FreshnessState::classify(10.0, &config), FreshnessState::Live);
        assert_eq!(FreshnessState::classify(10.5, &config), FreshnessState::Delayed);
        assert_eq!(FreshnessState::classify(30.0, &config), FreshnessState::Delayed);
        assert_eq!(FreshnessState::classify(31.0, &config), FreshnessState::Offline);
    }

    #[test]
    fn test_assess_is_stateless() {
        let monitor = FreshnessMonitor::default();
        assert_eq!(monitor.assess(t(0), t(45)).state, FreshnessState::Offline);
        assert_eq!(monitor.assess(t(40), t(45)).state, FreshnessState::Live);
        assert_eq!(monitor.assess(t(0), t(45)).minutes_since_last, 45.0);
    }

    #[test]
    fn test_future_reading_is_live() {
        let f = FreshnessMonitor::default().assess(t(10), t(0));
        assert_eq!(f.state, FreshnessState::Live);
        assert_eq!(f.minutes_since_last, 0.0);
    }

    #[test]
    fn test_empty_table() {
        assert!(FreshnessMonitor::default()
            .table(&ReadingTable::empty(), t(0))
            .is_err());
    }

    #[test]
    fn test_location_gaps_and_uptime() {
        let table = ReadingTable::new(vec![
            Reading::new(t(0), "a"),
            Reading::new(t(5), "a"),
            Reading::new(t(12), "a"),
            Reading::new(t(30), "a"),
            Reading::new(t(35), "a"),
            Reading::new(t(0), "b"),
        ]);
        let status = FreshnessMonitor::default().locations(&table, Some(t(50)));
        assert_eq!(status.len(), 2);

        let a = &status[0];
        assert_eq!(a.readings, 5);
        // 5, 7, 18, 5 minutes: only 18 exceeds 5 + 2
        assert_eq!(a.gaps, 1);
        assert_eq!(a.uptime_pct, Some(75.0));
        assert_eq!(a.freshness.unwrap().state, FreshnessState::Delayed);

        let b = &status[1];
        assert_eq!(b.uptime_pct, None);
        assert_eq!(b.freshness.unwrap().state, FreshnessState::Offline);
    }

    #[test]
    fn test_huge_gap_tolerance_saturates() {
        let sampling = SamplingConfig {
            interval_minutes: u32::MAX,
            gap_tolerance_minutes: u32::MAX,
            ..Default::default()
        };
        let monitor = FreshnessMonitor::new(&FreshnessConfig::default(), &sampling);
        let table = ReadingTable::new(vec![
            Reading::new(t(0), "a"),
            Reading::new(t(600), "a"),
        ]);
        let status = monitor.locations(&table, None);
        assert_eq!(status[0].gaps, 0);
        assert_eq!(status[0].uptime_pct, Some(100.0));
    }
}
