// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading normalization
//!
//! Turns loosely typed rows into [`Reading`]s. A row whose timestamp cannot be
//! parsed is rejected with a [`ParseError`] and left out of the table; the run
//! continues. Measurement cells that are blank, non-numeric or non-finite
//! become absent values, never zeros.

use crate::config::SamplingConfig;
use crate::error::ParseError;
use crate::reading::{RawReading, Reading, ReadingTable, ThreePhase, TodLabel};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use log::debug;

/// Layouts tried in order after RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Spreadsheet serial numbers accepted as timestamps (1954 to 2119).
const SERIAL_DAY_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

/// Result of normalizing a batch of raw rows.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Accepted readings, sorted
    pub table: ReadingTable,
    /// Rows that were dropped
    pub rejected: Vec<ParseError>,
    /// Measurement cells that held unusable text
    pub invalid_cells: usize,
}

/// Raw row normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_location: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&SamplingConfig::default())
    }
}

impl Normalizer {
    /// Create a normalizer using the sampling defaults
    pub fn new(sampling: &SamplingConfig) -> Self {
        Self {
            default_location: sampling.default_location.clone(),
        }
    }

    /// Normalize a batch of rows into a sorted table.
    pub fn normalize(&self, rows: &[RawReading]) -> Normalized {
        let mut readings = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();
        let mut invalid_cells = 0;

        for (idx, row) in rows.iter().enumerate() {
            match self.normalize_row(idx, row) {
                Ok((reading, bad)) => {
                    invalid_cells += bad;
                    readings.push(reading);
                }
                Err(e) => {
                    debug!("rejecting row: {}", e);
                    rejected.push(e);
                }
            }
        }

        Normalized {
            table: ReadingTable::new(readings),
            rejected,
            invalid_cells,
        }
    }

    /// Normalize one row. Returns the reading and the number of unusable cells.
    pub fn normalize_row(&self, row: usize, raw: &RawReading) -> Result<(Reading, usize), ParseError> {
        let text = raw
            .timestamp
            .as_deref()
            .map(strip_quotes)
            .filter(|s| !s.is_empty())
            .ok_or(ParseError::EmptyTimestamp { row })?;
        let timestamp = parse_timestamp(text).ok_or_else(|| ParseError::InvalidTimestamp {
            row,
            value: text.to_string(),
        })?;

        let location = raw
            .location
            .as_deref()
            .map(strip_quotes)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_location.as_str())
            .to_string();

        let mut bad = 0;
        let mut num = |cell: &Option<String>| -> Option<f64> {
            let (value, invalid) = parse_number(cell.as_deref());
            if invalid {
                bad += 1;
            }
            value
        };

        let mut reading = Reading::new(timestamp, location);
        reading.power_kw = num(&raw.power_kw);
        reading.energy_kwh = num(&raw.energy_kwh);
        reading.power_factor = num(&raw.power_factor);
        reading.current_total = num(&raw.current_total);
        let (r, y, b) = (num(&raw.current_r), num(&raw.current_y), num(&raw.current_b));
        reading.phase_currents = ThreePhase::from_parts(r, y, b);
        reading.current_n = num(&raw.current_n);
        let (ry, yb, br) = (
            num(&raw.voltage_ry),
            num(&raw.voltage_yb),
            num(&raw.voltage_br),
        );
        reading.line_voltages = ThreePhase::from_parts(ry, yb, br);
        reading.frequency = num(&raw.frequency);
        reading.tod = raw.tod_period.as_deref().and_then(TodLabel::parse);

        Ok((reading, bad))
    }
}

/// Parse a facility-local timestamp from any accepted layout.
///
/// Offsets in RFC 3339 input are dropped; the wall-clock part is kept.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = strip_quotes(text);
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    parse_serial_day(text)
}

fn parse_serial_day(text: &str) -> Option<NaiveDateTime> {
    let serial: f64 = text.parse().ok()?;
    if !SERIAL_DAY_RANGE.contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Parse a measurement cell. Returns the value and whether the cell held
/// text that could not be used.
fn parse_number(cell: Option<&str>) -> (Option<f64>, bool) {
    let Some(text) = cell.map(strip_quotes) else {
        return (None, false);
    };
    if text.is_empty() {
        return (None, false);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => (Some(v), false),
        _ => (None, true),
    }
}

fn strip_quotes(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '\'' || c == '"').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{RawColumn, TodPeriod};
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_space_and_t_separators() {
        let a = parse_timestamp("2025-03-10 14:05:00").unwrap();
        let b = parse_timestamp("2025-03-10T14:05:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hour(), 14);
        assert_eq!(a.minute(), 5);
    }

    #[test]
    fn test_parse_fractional_and_short_forms() {
        assert!(parse_timestamp("2025-03-10 14:05:00.123").is_some());
        assert!(parse_timestamp("2025-03-10 14:05").is_some());
        assert!(parse_timestamp("10/03/2025 14:05:00").is_some());
        assert!(parse_timestamp("'2025-03-10 14:05:00'").is_some());
    }

    #[test]
    fn test_parse_rfc3339_keeps_wall_clock() {
        let dt = parse_timestamp("2025-03-10T14:05:00+05:30").unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn test_parse_serial_day() {
        // 45658.5 = 2025-01-01 12:00
        let dt = parse_timestamp("45658.5").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2025, 1, 1, 12));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("not a time").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("12.5").is_none());
    }

    #[test]
    fn test_bad_timestamp_rejects_row_only() {
        let rows = vec![
            RawReading::new("2025-01-01 00:00:00", "Shed_01").with(RawColumn::EnergyKwh, 10.0),
            RawReading::new("garbage", "Shed_01"),
            RawReading::default(),
            RawReading::new("2025-01-01 00:05:00", "Shed_01").with(RawColumn::EnergyKwh, 11.0),
        ];
        let out = Normalizer::default().normalize(&rows);
        assert_eq!(out.table.len(), 2);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].row(), 1);
        assert!(matches!(out.rejected[1], ParseError::EmptyTimestamp { row: 2 }));
    }

    #[test]
    fn test_missing_optional_fields_do_not_drop_rows() {
        let rows = vec![RawReading::new("2025-01-01 00:00:00", "Shed_01")
            .with_text(RawColumn::PowerFactor, "n/a")
            .with_text(RawColumn::CurrentN, "")];
        let out = Normalizer::default().normalize(&rows);
        assert_eq!(out.table.len(), 1);
        assert_eq!(out.invalid_cells, 1);
        let r = &out.table.readings()[0];
        assert_eq!(r.power_factor, None);
        assert_eq!(r.current_n, None);
    }

    #[test]
    fn test_derived_fields() {
        let rows = vec![RawReading::new("2025-01-04 18:00:00", "")
            .with(RawColumn::PowerFactor, -0.87)
            .with_text(RawColumn::TodPeriod, "Off-Peak")];
        let out = Normalizer::default().normalize(&rows);
        let r = &out.table.readings()[0];
        assert_eq!(r.location, "main");
        assert_eq!(r.pf_abs(), Some(0.87));
        assert_eq!(r.tod_period(), Some(TodPeriod::OffPeak));
        assert!(r.is_weekend());
    }

    #[test]
    fn test_non_finite_becomes_absent() {
        let rows = vec![RawReading::new("2025-01-01 00:00:00", "a")
            .with_text(RawColumn::PowerKw, "inf")
            .with_text(RawColumn::EnergyKwh, "NaN")];
        let out = Normalizer::default().normalize(&rows);
        let r = &out.table.readings()[0];
        assert_eq!(r.power_kw, None);
        assert_eq!(r.energy_kwh, None);
        assert_eq!(out.invalid_cells, 2);
    }

    #[test]
    fn test_output_sorted() {
        let rows = vec![
            RawReading::new("2025-01-01T00:10:00", "a"),
            RawReading::new("2025-01-01 00:00:00", "a"),
        ];
        let out = Normalizer::default().normalize(&rows);
        let ts: Vec<u32> = out.table.iter().map(|r| r.timestamp.minute()).collect();
        assert_eq!(ts, vec![0, 10]);
    }
}
