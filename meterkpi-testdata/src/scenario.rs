// MeterKPI Testdata - Scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Scenario definitions.
//!
//! Each scenario injects one condition into an otherwise normal shed load
//! and describes what the KPI engine is expected to report for it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Injected condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Day-shift load, healthy PF, low neutral current.
    Normal,
    /// Energy counter replaced halfway through the window.
    CounterReset,
    /// PF drops to ~0.82 from 14:00 to 14:45 every afternoon.
    LowPowerFactor,
    /// Neutral current sits in HIGH/CRITICAL from 18:00 to 19:00 every evening.
    NeutralOverload,
    /// The third day of the window is missing entirely.
    MissingDays,
    /// Sheds switch off from 22:00 to 06:00.
    NightShutdown,
}

impl Scenario {
    /// Every scenario.
    pub const ALL: [Scenario; 6] = [
        Scenario::Normal,
        Scenario::CounterReset,
        Scenario::LowPowerFactor,
        Scenario::NeutralOverload,
        Scenario::MissingDays,
        Scenario::NightShutdown,
    ];

    /// Short identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::CounterReset => "counter_reset",
            Self::LowPowerFactor => "low_power_factor",
            Self::NeutralOverload => "neutral_overload",
            Self::MissingDays => "missing_days",
            Self::NightShutdown => "night_shutdown",
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Normal => "Regular day-shift operation",
            Self::CounterReset => "Energy counter resets to zero mid-window",
            Self::LowPowerFactor => "Sustained low power factor every afternoon",
            Self::NeutralOverload => "Evening neutral current overload",
            Self::MissingDays => "One whole day of readings is absent",
            Self::NightShutdown => "Load switched off overnight",
        }
    }

    /// Parse a scenario name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// What the engine should report for `days` days at `locations` sheds.
    pub fn expectation(&self, days: u32, locations: usize) -> ScenarioExpectation {
        let days = days as usize;
        let mut expected = ScenarioExpectation::default();
        match self {
            Self::Normal => {}
            Self::CounterReset => expected.counter_resets = locations,
            Self::LowPowerFactor => expected.sustained_pf_events = days * locations,
            Self::NeutralOverload => expected.high_risk_transitions = days * locations,
            Self::MissingDays => expected.missing_days = usize::from(days >= 4),
            Self::NightShutdown => expected.idle_readings = true,
        }
        expected
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected engine outcome for a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioExpectation {
    /// Counter drops across all locations.
    pub counter_resets: usize,
    /// Sustained low-PF runs across all locations.
    pub sustained_pf_events: usize,
    /// Entries into HIGH or CRITICAL neutral current.
    pub high_risk_transitions: usize,
    /// Calendar days with no readings.
    pub missing_days: usize,
    /// Whether some readings carry no load.
    #[serde(default)]
    pub idle_readings: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_roundtrip() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_name(scenario.name()), Some(scenario));
        }
        assert_eq!(Scenario::from_name(" Low_Power_Factor "), Some(Scenario::LowPowerFactor));
        assert_eq!(Scenario::from_name("brownout"), None);
    }

    #[test]
    fn test_expectations() {
        assert_eq!(
            Scenario::Normal.expectation(7, 2),
            ScenarioExpectation::default()
        );
        assert_eq!(Scenario::CounterReset.expectation(7, 2).counter_resets, 2);
        assert_eq!(Scenario::LowPowerFactor.expectation(7, 2).sustained_pf_events, 14);
        assert_eq!(Scenario::MissingDays.expectation(3, 1).missing_days, 0);
        assert_eq!(Scenario::MissingDays.expectation(4, 1).missing_days, 1);
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&Scenario::NightShutdown).unwrap();
        assert_eq!(json, "\"night_shutdown\"");
    }
}
