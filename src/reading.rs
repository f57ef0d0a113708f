// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading records and the reading table.
//!
//! [`RawReading`] mirrors a spreadsheet row: every cell is optional text.
//! [`Reading`] is the typed record produced by the normalizer, and
//! [`ReadingTable`] is an immutable, timestamp-ordered collection of them.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// One raw row as delivered by the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawReading {
    pub timestamp: Option<String>,
    pub location: Option<String>,
    pub power_kw: Option<String>,
    pub energy_kwh: Option<String>,
    pub power_factor: Option<String>,
    pub current_total: Option<String>,
    pub current_r: Option<String>,
    pub current_y: Option<String>,
    pub current_b: Option<String>,
    pub current_n: Option<String>,
    pub voltage_ry: Option<String>,
    pub voltage_yb: Option<String>,
    pub voltage_br: Option<String>,
    pub frequency: Option<String>,
    pub tod_period: Option<String>,
}

impl RawReading {
    /// Create a raw row with a timestamp and location
    pub fn new(timestamp: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            location: Some(location.into()),
            ..Default::default()
        }
    }

    /// Set a numeric cell from a value
    pub fn with(mut self, column: RawColumn, value: f64) -> Self {
        *self.cell_mut(column) = Some(value.to_string());
        self
    }

    /// Set any cell from text
    pub fn with_text(mut self, column: RawColumn, value: impl Into<String>) -> Self {
        *self.cell_mut(column) = Some(value.into());
        self
    }

    /// Mutable access to a cell by column
    pub fn cell_mut(&mut self, column: RawColumn) -> &mut Option<String> {
        match column {
            RawColumn::Timestamp => &mut self.timestamp,
            RawColumn::Location => &mut self.location,
            RawColumn::PowerKw => &mut self.power_kw,
            RawColumn::EnergyKwh => &mut self.energy_kwh,
            RawColumn::PowerFactor => &mut self.power_factor,
            RawColumn::CurrentTotal => &mut self.current_total,
            RawColumn::CurrentR => &mut self.current_r,
            RawColumn::CurrentY => &mut self.current_y,
            RawColumn::CurrentB => &mut self.current_b,
            RawColumn::CurrentN => &mut self.current_n,
            RawColumn::VoltageRy => &mut self.voltage_ry,
            RawColumn::VoltageYb => &mut self.voltage_yb,
            RawColumn::VoltageBr => &mut self.voltage_br,
            RawColumn::Frequency => &mut self.frequency,
            RawColumn::TodPeriod => &mut self.tod_period,
        }
    }

    /// Read access to a cell by column
    pub fn cell(&self, column: RawColumn) -> Option<&str> {
        let cell = match column {
            RawColumn::Timestamp => &self.timestamp,
            RawColumn::Location => &self.location,
            RawColumn::PowerKw => &self.power_kw,
            RawColumn::EnergyKwh => &self.energy_kwh,
            RawColumn::PowerFactor => &self.power_factor,
            RawColumn::CurrentTotal => &self.current_total,
            RawColumn::CurrentR => &self.current_r,
            RawColumn::CurrentY => &self.current_y,
            RawColumn::CurrentB => &self.current_b,
            RawColumn::CurrentN => &self.current_n,
            RawColumn::VoltageRy => &self.voltage_ry,
            RawColumn::VoltageYb => &self.voltage_yb,
            RawColumn::VoltageBr => &self.voltage_br,
            RawColumn::Frequency => &self.frequency,
            RawColumn::TodPeriod => &self.tod_period,
        };
        cell.as_deref()
    }
}

/// Columns of a raw row, with their spreadsheet header names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawColumn {
    Timestamp,
    Location,
    PowerKw,
    EnergyKwh,
    PowerFactor,
    CurrentTotal,
    CurrentR,
    CurrentY,
    CurrentB,
    CurrentN,
    VoltageRy,
    VoltageYb,
    VoltageBr,
    Frequency,
    TodPeriod,
}

impl RawColumn {
    /// All columns in sheet order
    pub const ALL: [RawColumn; 15] = [
        RawColumn::Timestamp,
        RawColumn::Location,
        RawColumn::PowerKw,
        RawColumn::EnergyKwh,
        RawColumn::PowerFactor,
        RawColumn::CurrentTotal,
        RawColumn::CurrentR,
        RawColumn::CurrentY,
        RawColumn::CurrentB,
        RawColumn::CurrentN,
        RawColumn::VoltageRy,
        RawColumn::VoltageYb,
        RawColumn::VoltageBr,
        RawColumn::Frequency,
        RawColumn::TodPeriod,
    ];

    /// Header used by the readings sheet
    pub fn header(&self) -> &'static str {
        match self {
            Self::Timestamp => "Timestamp",
            Self::Location => "Location",
            Self::PowerKw => "kW_Total",
            Self::EnergyKwh => "Energy_kWh",
            Self::PowerFactor => "PF_Avg",
            Self::CurrentTotal => "Current_Total",
            Self::CurrentR => "Current_R",
            Self::CurrentY => "Current_Y",
            Self::CurrentB => "Current_B",
            Self::CurrentN => "Neutral_Current_A",
            Self::VoltageRy => "V_RY",
            Self::VoltageYb => "V_YB",
            Self::VoltageBr => "V_BR",
            Self::Frequency => "Frequency_Hz",
            Self::TodPeriod => "ToD_Period",
        }
    }

    /// Match a header case-insensitively
    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.header().eq_ignore_ascii_case(header))
    }
}

/// Time-of-day tariff period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TodPeriod {
    Peak,
    Normal,
    OffPeak,
}

impl TodPeriod {
    /// All periods, most expensive first
    pub const ALL: [TodPeriod; 3] = [TodPeriod::Peak, TodPeriod::Normal, TodPeriod::OffPeak];

    /// Canonical label after normalization
    pub fn label(&self) -> &'static str {
        match self {
            Self::Peak => "PEAK",
            Self::Normal => "NORMAL",
            Self::OffPeak => "OFFPEAK",
        }
    }

    /// Normalize a free-text label: trim, uppercase, drop hyphens.
    pub fn normalize_label(raw: &str) -> String {
        raw.trim().to_uppercase().replace('-', "")
    }

    /// Parse an already normalized label
    pub fn from_normalized(label: &str) -> Option<Self> {
        match label {
            "PEAK" => Some(Self::Peak),
            "NORMAL" => Some(Self::Normal),
            "OFFPEAK" => Some(Self::OffPeak),
            _ => None,
        }
    }

    /// Key fragment used in KPI names
    pub fn key(&self) -> &'static str {
        match self {
            Self::Peak => "peak",
            Self::Normal => "normal",
            Self::OffPeak => "offpeak",
        }
    }
}

impl fmt::Display for TodPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// ToD label as found on a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodLabel {
    /// One of the three tariff periods
    Known(TodPeriod),
    /// Normalized text that matched no period
    Unrecognized(String),
}

impl TodLabel {
    /// Build from raw text. Blank text yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = TodPeriod::normalize_label(raw);
        if normalized.is_empty() {
            return None;
        }
        Some(match TodPeriod::from_normalized(&normalized) {
            Some(period) => Self::Known(period),
            None => Self::Unrecognized(normalized),
        })
    }

    /// The period, when recognized
    pub fn period(&self) -> Option<TodPeriod> {
        match self {
            Self::Known(p) => Some(*p),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Three phase or line values. Present only when all three are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreePhase {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl ThreePhase {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Combine three optional values
    pub fn from_parts(a: Option<f64>, b: Option<f64>, c: Option<f64>) -> Option<Self> {
        Some(Self::new(a?, b?, c?))
    }

    pub fn max(&self) -> f64 {
        self.a.max(self.b).max(self.c)
    }

    pub fn min(&self) -> f64 {
        self.a.min(self.b).min(self.c)
    }

    pub fn mean(&self) -> f64 {
        (self.a + self.b + self.c) / 3.0
    }

    pub fn values(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }
}

/// A normalized meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Facility-local wall-clock time
    pub timestamp: NaiveDateTime,
    /// Meter location (shed code)
    pub location: String,
    /// Instantaneous active power (kW)
    pub power_kw: Option<f64>,
    /// Cumulative energy counter (kWh)
    pub energy_kwh: Option<f64>,
    /// Signed power factor
    pub power_factor: Option<f64>,
    /// Total current (A)
    pub current_total: Option<f64>,
    /// R/Y/B phase currents (A)
    pub phase_currents: Option<ThreePhase>,
    /// Neutral current (A)
    pub current_n: Option<f64>,
    /// RY/YB/BR line voltages (V)
    pub line_voltages: Option<ThreePhase>,
    /// Grid frequency (Hz)
    pub frequency: Option<f64>,
    /// Normalized ToD label
    pub tod: Option<TodLabel>,
}

impl Reading {
    /// Create a reading with only the mandatory fields
    pub fn new(timestamp: NaiveDateTime, location: impl Into<String>) -> Self {
        Self {
            timestamp,
            location: location.into(),
            power_kw: None,
            energy_kwh: None,
            power_factor: None,
            current_total: None,
            phase_currents: None,
            current_n: None,
            line_voltages: None,
            frequency: None,
            tod: None,
        }
    }

    /// Calendar day of the reading
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Day of week of the reading
    pub fn day_of_week(&self) -> Weekday {
        self.timestamp.weekday()
    }

    /// Saturday or Sunday
    pub fn is_weekend(&self) -> bool {
        is_weekend(self.date())
    }

    /// Absolute power factor
    pub fn pf_abs(&self) -> Option<f64> {
        self.power_factor.map(f64::abs)
    }

    /// Absolute neutral current
    pub fn neutral_abs(&self) -> Option<f64> {
        self.current_n.map(f64::abs)
    }

    /// Recognized tariff period
    pub fn tod_period(&self) -> Option<TodPeriod> {
        self.tod.as_ref().and_then(TodLabel::period)
    }

    /// Deterministic ordering used by the table: time, location, counter.
    fn order_key_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.location.cmp(&other.location))
            .then_with(|| {
                let a = self.energy_kwh.unwrap_or(f64::NEG_INFINITY);
                let b = other.energy_kwh.unwrap_or(f64::NEG_INFINITY);
                a.total_cmp(&b)
            })
    }
}

/// Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Immutable, timestamp-ordered set of readings, possibly from several locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingTable {
    readings: Vec<Reading>,
}

impl ReadingTable {
    /// Build a table, sorting the readings.
    pub fn new(mut readings: Vec<Reading>) -> Self {
        readings.sort_by(Reading::order_key_cmp);
        Self { readings }
    }

    /// Empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Readings in order
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Iterate readings in order
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Distinct locations, sorted
    pub fn locations(&self) -> Vec<&str> {
        let mut locations: Vec<&str> = self.readings.iter().map(|r| r.location.as_str()).collect();
        locations.sort_unstable();
        locations.dedup();
        locations
    }

    /// Readings grouped by location, each group in timestamp order.
    pub fn by_location(&self) -> BTreeMap<&str, Vec<&Reading>> {
        let mut groups: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
        for reading in &self.readings {
            groups.entry(reading.location.as_str()).or_default().push(reading);
        }
        groups
    }

    /// New table holding one location's readings.
    pub fn for_location(&self, location: &str) -> ReadingTable {
        Self {
            readings: self
                .readings
                .iter()
                .filter(|r| r.location == location)
                .cloned()
                .collect(),
        }
    }

    /// Earliest timestamp
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.readings.first().map(|r| r.timestamp)
    }

    /// Latest timestamp
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.readings.last().map(|r| r.timestamp)
    }

    /// Calendar days spanned, inclusive of both ends.
    pub fn data_days(&self) -> Option<i64> {
        let first = self.first_timestamp()?;
        let last = self.latest_timestamp()?;
        Some((last - first).num_days() + 1)
    }
}

impl FromIterator<Reading> for ReadingTable {
    fn from_iter<I: IntoIterator<Item = Reading>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
