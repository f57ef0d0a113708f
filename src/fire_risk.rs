// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Neutral-current fire risk
//!
//! A healthy balanced feeder carries almost no neutral current. Loose
//! terminations and heavy imbalance push it up and heat the conductor.
//! Readings are bucketed into four tiers by `|current_n|`:
//!
//! | tier     | range (defaults)   |
//! |----------|--------------------|
//! | SAFE     | `< 5 A`            |
//! | WATCH    | `[5, 10) A`        |
//! | HIGH     | `[10, 20) A`       |
//! | CRITICAL | `>= 20 A`          |
//!
//! Boundaries belong to the higher tier.

use crate::config::FireRiskConfig;
use crate::error::{Field, KpiError, Result};
use crate::reading::ReadingTable;
use crate::stats;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Fire-risk tier, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FireRiskTier {
    Safe,
    Watch,
    High,
    Critical,
}

impl FireRiskTier {
    pub const ALL: [FireRiskTier; 4] = [Self::Safe, Self::Watch, Self::High, Self::Critical];

    /// Tier for a neutral-current magnitude.
    pub fn classify(neutral_a: f64, config: &FireRiskConfig) -> Self {
        let magnitude = neutral_a.abs();
        if magnitude >= config.critical_a {
            Self::Critical
        } else if magnitude >= config.high_a {
            Self::High
        } else if magnitude >= config.watch_a {
            Self::Watch
        } else {
            Self::Safe
        }
    }

    /// HIGH or CRITICAL
    pub fn is_high_risk(&self) -> bool {
        *self >= Self::High
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Watch => "WATCH",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for FireRiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Readings per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub safe: usize,
    pub watch: usize,
    pub high: usize,
    pub critical: usize,
}

impl TierCounts {
    pub fn get(&self, tier: FireRiskTier) -> usize {
        match tier {
            FireRiskTier::Safe => self.safe,
            FireRiskTier::Watch => self.watch,
            FireRiskTier::High => self.high,
            FireRiskTier::Critical => self.critical,
        }
    }

    fn add(&mut self, tier: FireRiskTier) {
        match tier {
            FireRiskTier::Safe => self.safe += 1,
            FireRiskTier::Watch => self.watch += 1,
            FireRiskTier::High => self.high += 1,
            FireRiskTier::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.safe + self.watch + self.high + self.critical
    }
}

/// A HIGH-or-above reading on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireEvent {
    pub timestamp: NaiveDateTime,
    pub location: String,
    pub neutral_a: f64,
    pub tier: FireRiskTier,
}

/// Fire-risk outcome for a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireRiskSummary {
    pub counts: TierCounts,
    /// HIGH-or-above readings in chronological order
    pub timeline: Vec<FireEvent>,
    /// Entries into HIGH-or-above, per location
    pub transitions: BTreeMap<String, usize>,
    pub neutral_avg_a: f64,
    pub neutral_max_a: f64,
}

impl FireRiskSummary {
    /// Entries into HIGH-or-above over all locations
    pub fn total_transitions(&self) -> usize {
        self.transitions.values().sum()
    }
}

/// Fire-risk classifier
#[derive(Debug, Clone, Default)]
pub struct FireRiskClassifier {
    config: FireRiskConfig,
}

impl FireRiskClassifier {
    pub fn new(config: &FireRiskConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn classify(&self, neutral_a: f64) -> FireRiskTier {
        FireRiskTier::classify(neutral_a, &self.config)
    }

    /// Classify every reading carrying a neutral current.
    ///
    /// A transition is a reading in HIGH or above whose previous reading at
    /// the same location was below HIGH. A location that starts in HIGH
    /// counts as one transition.
    pub fn analyze(&self, table: &ReadingTable) -> Result<FireRiskSummary> {
        let mut counts = TierCounts::default();
        let mut timeline = Vec::new();
        let mut transitions = BTreeMap::new();
        let mut magnitudes = Vec::new();

        for (location, readings) in table.by_location() {
            let mut was_high = false;
            let mut seen = false;
            let mut entries = 0;
            for reading in readings {
                let Some(neutral_a) = reading.neutral_abs() else {
                    continue;
                };
                let tier = self.classify(neutral_a);
                seen = true;
                counts.add(tier);
                magnitudes.push(neutral_a);

                let high = tier.is_high_risk();
                if high {
                    if !was_high {
                        entries += 1;
                    }
                    timeline.push(FireEvent {
                        timestamp: reading.timestamp,
                        location: location.to_string(),
                        neutral_a,
                        tier,
                    });
                }
                was_high = high;
            }
            if seen {
                transitions.insert(location.to_string(), entries);
            }
        }

        let (Some(neutral_avg_a), Some(neutral_max_a)) =
            (stats::mean(&magnitudes), stats::max(&magnitudes))
        else {
            return Err(KpiError::MissingField(Field::NeutralCurrent));
        };

        timeline.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.location.cmp(&b.location))
        });

        Ok(FireRiskSummary {
            counts,
            timeline,
            transitions,
            neutral_avg_a,
            neutral_max_a,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;
    use chrono::{Duration, NaiveDate};

    fn series(location: &str, values: &[f64]) -> Vec<Reading> {
        let start = NaiveDate::from_ymd_opt(2025, 2, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut r = Reading::new(start + Duration::minutes(5 * i as i64), location);
                r.current_n = Some(*v);
                r
            })
            .collect()
    }

    #[test]
    fn test_boundaries_belong_to_higher_tier() {
        let c = FireRiskClassifier::default();
        assert_eq!(c.classify(4.999), FireRiskTier::Safe);
        assert_eq!(c.classify(5.0), FireRiskTier::Watch);
        assert_eq!(c.classify(9.999), FireRiskTier::Watch);
        assert_eq!(c.classify(10.0), FireRiskTier::High);
        assert_eq!(c.classify(19.999), FireRiskTier::High);
        assert_eq!(c.classify(20.0), FireRiskTier::Critical);
        assert_eq!(c.classify(-12.0), FireRiskTier::High);
    }

    #[test]
    fn test_counts_and_timeline() {
        let table = ReadingTable::new(series("a", &[1.0, 6.0, 12.0, 25.0, 3.0]));
        let summary = FireRiskClassifier::default().analyze(&table).unwrap();
        assert_eq!(summary.counts, TierCounts { safe: 2, watch: 1, high: 1, critical: 1 });
        assert_eq!(summary.timeline.len(), 2);
        assert_eq!(summary.timeline[0].tier, FireRiskTier::High);
        assert_eq!(summary.timeline[1].tier, FireRiskTier::Critical);
        assert_eq!(summary.neutral_max_a, 25.0);
        assert!((summary.neutral_avg_a - 9.4).abs() < 1e-9);
    }

    #[test]
    fn test_transitions_per_location() {
        let mut readings = series("a", &[12.0, 15.0, 2.0, 11.0, 30.0, 1.0]);
        readings.extend(series("b", &[1.0, 1.0, 10.0]));
        let table = ReadingTable::new(readings);
        let summary = FireRiskClassifier::default().analyze(&table).unwrap();
        assert_eq!(summary.transitions["a"], 2);
        assert_eq!(summary.transitions["b"], 1);
        assert_eq!(summary.total_transitions(), 3);
    }

    #[test]
    fn test_no_neutral_current() {
        let table = ReadingTable::new(vec![Reading::new(
            NaiveDate::from_ymd_opt(2025, 2, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            "a",
        )]);
        assert_eq!(
            FireRiskClassifier::default().analyze(&table),
            Err(KpiError::MissingField(Field::NeutralCurrent))
        );
    }

    #[test]
    fn test_partition_is_total() {
        let c = FireRiskClassifier::default();
        let mut counts = TierCounts::default();
        for i in 0..400 {
            counts.add(c.classify(i as f64 / 10.0));
        }
        assert_eq!(counts.total(), 400);
        assert_eq!(counts.get(FireRiskTier::Safe), 50);
        assert_eq!(counts.get(FireRiskTier::Watch), 50);
        assert_eq!(counts.get(FireRiskTier::High), 100);
        assert_eq!(counts.get(FireRiskTier::Critical), 200);
    }
}
