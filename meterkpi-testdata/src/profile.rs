// MeterKPI Testdata - Load profiles
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Shed load profile and tariff calendar.
//!
//! Load is expressed as a share of contracted demand. The profile is a
//! plateau for the day shift with a morning ramp and a lower evening
//! level, scaled down on weekends.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// ToD label printed in the sheet for an hour of the day.
///
/// NORMAL 06-17, PEAK 17-23, OFF-PEAK otherwise.
pub fn tod_label(hour: u32) -> &'static str {
    match hour {
        6..=16 => "NORMAL",
        17..=22 => "PEAK",
        _ => "OFF-PEAK",
    }
}

/// Daily load shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    /// Overnight share of contract.
    pub night_share: f64,
    /// Day-shift plateau share of contract.
    pub shift_share: f64,
    /// Evening share of contract, between shift end and night.
    pub evening_share: f64,
    /// First full hour of the day shift.
    pub shift_start_hour: u32,
    /// Hour the day shift ends.
    pub shift_end_hour: u32,
    /// Hour the evening load drops to night level.
    pub evening_end_hour: u32,
    /// Multiplier applied on Saturday and Sunday.
    pub weekend_factor: f64,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            night_share: 0.25,
            shift_share: 0.70,
            evening_share: 0.45,
            shift_start_hour: 8,
            shift_end_hour: 18,
            evening_end_hour: 22,
            weekend_factor: 0.6,
        }
    }
}

impl LoadProfile {
    /// Share of contracted demand at a time, before noise.
    pub fn load_share(&self, ts: NaiveDateTime) -> f64 {
        let hour = ts.hour();
        let fraction = f64::from(ts.minute()) / 60.0;

        let share = if hour + 1 == self.shift_start_hour {
            // Morning ramp
            self.night_share + (self.shift_share - self.night_share) * fraction
        } else if (self.shift_start_hour..self.shift_end_hour).contains(&hour) {
            self.shift_share
        } else if (self.shift_end_hour..self.evening_end_hour).contains(&hour) {
            self.evening_share
        } else {
            self.night_share
        };

        if matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) {
            share * self.weekend_factor
        } else {
            share
        }
    }
}

/// Zero-mean gaussian jitter. A non-finite deviation yields zero.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    Normal::new(0.0, std_dev.abs())
        .map(|n| n.sample(rng))
        .unwrap_or(0.0)
}

/// Round to three decimals, as meters export.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
