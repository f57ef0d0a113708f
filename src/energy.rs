// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Energy reconciliation
//!
//! Derives consumed energy from the cumulative `energy_kwh` counter.
//!
//! - **Total**: `last - first` per location. When that is negative the meter was
//!   reset somewhere, so the total is rebuilt from the positive consecutive
//!   differences only. Locations are summed after this, never before.
//! - **Per day**: the same rule inside every (date, location) group. Days above
//!   the configured cap are kept in the series but flagged and left out of
//!   aggregates.
//! - **Missing days**: an optional display overlay filling absent dates with the
//!   weekday or weekend mean of the actual days. It never feeds a KPI.

use crate::config::EnergyConfig;
use crate::error::{Field, KpiError, Result};
use crate::reading::{is_weekend, Reading, ReadingTable};
use crate::stats;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Energy derived from one ordered run of counter values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CounterDelta {
    /// Consumed energy (kWh), never negative
    pub kwh: f64,
    /// Counter decreases seen in the run
    pub resets: usize,
    /// True when the positive-difference sum replaced `last - first`
    pub recovered: bool,
    /// Counter values used
    pub readings: usize,
}

/// Consumed energy from an ordered run of counter values.
///
/// Needs at least two values. If `last - first` is negative the result is the
/// sum of positive consecutive differences; decreases contribute nothing.
pub fn counter_delta(values: &[f64]) -> Result<CounterDelta> {
    let (first, last) = match (values.first(), values.last()) {
        (Some(f), Some(l)) if values.len() >= 2 => (*f, *l),
        _ => return Err(KpiError::insufficient("energy", 2, values.len())),
    };

    let resets = values.windows(2).filter(|w| w[1] < w[0]).count();
    let direct = last - first;
    if direct >= 0.0 {
        return Ok(CounterDelta {
            kwh: direct,
            resets,
            recovered: false,
            readings: values.len(),
        });
    }

    let kwh = values
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .sum();
    Ok(CounterDelta {
        kwh,
        resets,
        recovered: true,
        readings: values.len(),
    })
}

fn counter_values<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Vec<f64> {
    readings.into_iter().filter_map(|r| r.energy_kwh).collect()
}

/// Total energy across all locations of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableEnergy {
    /// Sum over locations with enough data (kWh)
    pub total_kwh: f64,
    /// Per-location deltas
    pub locations: BTreeMap<String, CounterDelta>,
    /// Locations skipped for lack of counter readings
    pub skipped: Vec<String>,
}

impl TableEnergy {
    /// Counter resets across all locations
    pub fn resets(&self) -> usize {
        self.locations.values().map(|d| d.resets).sum()
    }
}

/// One (date, location) row of the per-day series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEnergy {
    pub date: NaiveDate,
    pub location: String,
    /// Energy for the day (kWh)
    pub energy_kwh: f64,
    /// Highest instantaneous power seen that day (kW)
    pub peak_kw: Option<f64>,
    /// Counter readings in the group
    pub readings: usize,
    /// Counter decreases inside the day
    pub resets: usize,
    /// Above the daily cap; excluded from aggregates
    pub outlier: bool,
    pub is_weekend: bool,
}

/// Per-day energy series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyEnergySeries {
    /// Rows ordered by (date, location)
    pub days: Vec<DailyEnergy>,
    /// (date, location) groups with fewer than two counter readings
    pub insufficient: Vec<(NaiveDate, String)>,
}

impl DailyEnergySeries {
    /// Sum of non-outlier rows (kWh)
    pub fn aggregate_kwh(&self) -> f64 {
        self.days
            .iter()
            .filter(|d| !d.outlier)
            .map(|d| d.energy_kwh)
            .sum()
    }

    /// Energy per date, summed across locations, outliers excluded.
    ///
    /// A date whose rows are all outliers does not appear.
    pub fn by_date(&self) -> BTreeMap<NaiveDate, f64> {
        let mut totals = BTreeMap::new();
        for day in self.days.iter().filter(|d| !d.outlier) {
            *totals.entry(day.date).or_insert(0.0) += day.energy_kwh;
        }
        totals
    }

    /// Mean energy per date (kWh)
    pub fn average_daily_kwh(&self) -> Option<f64> {
        let totals: Vec<f64> = self.by_date().into_values().collect();
        stats::mean(&totals)
    }

    /// Number of outlier rows
    pub fn outlier_count(&self) -> usize {
        self.days.iter().filter(|d| d.outlier).count()
    }

    /// Dates carrying at least one row
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.days.iter().map(|d| d.date).collect()
    }

    /// Dates between the first and last row that have no row at all.
    pub fn missing_dates(&self) -> Vec<NaiveDate> {
        let present = self.dates();
        let (Some(first), Some(last)) = (present.first(), present.last()) else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|d| d <= last)
            .filter(|d| !present.contains(d))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Display-only estimate for a date with no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatedDay {
    pub date: NaiveDate,
    pub energy_kwh: f64,
    pub is_weekend: bool,
}

/// Energy reconciler
#[derive(Debug, Clone, Default)]
pub struct EnergyReconciler {
    config: EnergyConfig,
}

impl EnergyReconciler {
    pub fn new(config: &EnergyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Total energy for one location's ordered readings.
    pub fn location_total(&self, readings: &[&Reading]) -> Result<CounterDelta> {
        let values = counter_values(readings.iter().copied());
        if values.is_empty() && !readings.is_empty() {
            return Err(KpiError::MissingField(Field::EnergyKwh));
        }
        counter_delta(&values)
    }

    /// Total energy over every location of the table.
    ///
    /// Fails with `InsufficientData` when no location has two counter readings.
    pub fn total(&self, table: &ReadingTable) -> Result<TableEnergy> {
        let mut locations = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut last_err = None;

        for (location, readings) in table.by_location() {
            match self.location_total(&readings) {
                Ok(delta) => {
                    if delta.recovered {
                        debug!(
                            "{}: counter reset detected ({} decreases), using positive differences",
                            location, delta.resets
                        );
                    }
                    locations.insert(location.to_string(), delta);
                }
                Err(e) => {
                    debug!("{}: no total energy: {}", location, e);
                    skipped.push(location.to_string());
                    last_err = Some(e);
                }
            }
        }

        if locations.is_empty() {
            return Err(last_err.unwrap_or_else(|| KpiError::insufficient("total_energy", 2, 0)));
        }

        Ok(TableEnergy {
            total_kwh: locations.values().map(|d| d.kwh).sum(),
            locations,
            skipped,
        })
    }

    /// Per-day energy, grouped by (date, location).
    pub fn daily(&self, table: &ReadingTable) -> DailyEnergySeries {
        let mut groups: BTreeMap<(NaiveDate, &str), Vec<&Reading>> = BTreeMap::new();
        for reading in table.iter() {
            groups
                .entry((reading.date(), reading.location.as_str()))
                .or_default()
                .push(reading);
        }

        let mut series = DailyEnergySeries::default();
        for ((date, location), readings) in groups {
            let values = counter_values(readings.iter().copied());
            match counter_delta(&values) {
                Ok(delta) => {
                    let outlier = delta.kwh > self.config.daily_outlier_cap_kwh;
                    if outlier {
                        debug!(
                            "{} {}: {:.1} kWh exceeds daily cap {:.1}",
                            date, location, delta.kwh, self.config.daily_outlier_cap_kwh
                        );
                    }
                    let powers: Vec<f64> = readings.iter().filter_map(|r| r.power_kw).collect();
                    series.days.push(DailyEnergy {
                        date,
                        location: location.to_string(),
                        energy_kwh: delta.kwh,
                        peak_kw: stats::max(&powers),
                        readings: delta.readings,
                        resets: delta.resets,
                        outlier,
                        is_weekend: is_weekend(date),
                    });
                }
                Err(_) => series.insufficient.push((date, location.to_string())),
            }
        }
        series
    }

    /// Estimates for dates absent from the series.
    ///
    /// Each missing date gets the mean of the actual weekday or weekend totals,
    /// matching its own day type. Dates whose day type has no actual data are
    /// omitted.
    pub fn estimate_missing_days(&self, series: &DailyEnergySeries) -> Vec<EstimatedDay> {
        let totals = series.by_date();
        let (weekend, weekday): (Vec<_>, Vec<_>) = totals
            .iter()
            .partition(|(date, _)| is_weekend(**date));
        let weekend: Vec<f64> = weekend.into_iter().map(|(_, v)| *v).collect();
        let weekday: Vec<f64> = weekday.into_iter().map(|(_, v)| *v).collect();
        let weekend_mean = stats::mean(&weekend);
        let weekday_mean = stats::mean(&weekday);

        series
            .missing_dates()
            .into_iter()
            .filter_map(|date| {
                let weekend = is_weekend(date);
                let mean = if weekend { weekend_mean } else { weekday_mean };
                mean.map(|energy_kwh| EstimatedDay {
                    date,
                    energy_kwh,
                    is_weekend: weekend,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn reading(day: u32, hour: u32, location: &str, kwh: f64) -> Reading {
        let mut r = Reading::new(at(day, hour), location);
        r.energy_kwh = Some(kwh);
        r
    }

    #[test]
    fn test_counter_delta_direct() {
        let d = counter_delta(&[100.0, 110.0, 125.0]).unwrap();
        assert_relative_eq!(d.kwh, 25.0);
        assert!(!d.recovered);
        assert_eq!(d.resets, 0);
    }

    #[test]
    fn test_counter_delta_reset_recovery() {
        // 100 -> 150 (+50), reset to 5, 5 -> 30 (+25)
        let d = counter_delta(&[100.0, 150.0, 5.0, 30.0]).unwrap();
        assert!(d.recovered);
        assert_eq!(d.resets, 1);
        assert_relative_eq!(d.kwh, 75.0);
    }

    #[test]
    fn test_counter_delta_needs_two() {
        assert!(matches!(
            counter_delta(&[5.0]),
            Err(KpiError::InsufficientData { available: 1, .. })
        ));
        assert!(counter_delta(&[]).is_err());
    }

    #[test]
    fn test_total_sums_locations_separately() {
        let table = ReadingTable::new(vec![
            reading(1, 0, "a", 1000.0),
            reading(1, 0, "b", 50.0),
            reading(1, 1, "a", 1010.0),
            reading(1, 1, "b", 55.0),
        ]);
        let total = EnergyReconciler::default().total(&table).unwrap();
        assert_relative_eq!(total.total_kwh, 15.0);
        assert_eq!(total.locations.len(), 2);
    }

    #[test]
    fn test_total_skips_thin_location() {
        let table = ReadingTable::new(vec![
            reading(1, 0, "a", 10.0),
            reading(1, 1, "a", 20.0),
            reading(1, 0, "b", 50.0),
        ]);
        let total = EnergyReconciler::default().total(&table).unwrap();
        assert_relative_eq!(total.total_kwh, 10.0);
        assert_eq!(total.skipped, vec!["b".to_string()]);
    }

    #[test]
    fn test_total_insufficient() {
        let table = ReadingTable::new(vec![reading(1, 0, "a", 10.0)]);
        assert!(matches!(
            EnergyReconciler::default().total(&table),
            Err(KpiError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_total_missing_counter() {
        let table = ReadingTable::new(vec![
            Reading::new(at(1, 0), "a"),
            Reading::new(at(1, 1), "a"),
        ]);
        assert_eq!(
            EnergyReconciler::default().total(&table),
            Err(KpiError::MissingField(Field::EnergyKwh))
        );
    }

    #[test]
    fn test_daily_groups_by_date_and_location() {
        let table = ReadingTable::new(vec![
            reading(1, 0, "a", 0.0),
            reading(1, 23, "a", 100.0),
            reading(1, 0, "b", 500.0),
            reading(1, 23, "b", 520.0),
            reading(2, 0, "a", 110.0),
            reading(2, 12, "a", 150.0),
        ]);
        let series = EnergyReconciler::default().daily(&table);
        assert_eq!(series.days.len(), 3);
        let by_date = series.by_date();
        assert_relative_eq!(by_date[&NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()], 120.0);
        assert_relative_eq!(by_date[&NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()], 40.0);
    }

    #[test]
    fn test_daily_outlier_flagged_and_excluded() {
        let config = EnergyConfig {
            daily_outlier_cap_kwh: 500.0,
            ..Default::default()
        };
        let table = ReadingTable::new(vec![
            reading(1, 0, "a", 0.0),
            reading(1, 23, "a", 100.0),
            reading(2, 0, "a", 100.0),
            reading(2, 23, "a", 5000.0),
        ]);
        let series = EnergyReconciler::new(&config).daily(&table);
        assert_eq!(series.days.len(), 2);
        assert!(series.days[1].outlier);
        assert_eq!(series.outlier_count(), 1);
        assert_relative_eq!(series.aggregate_kwh(), 100.0);
    }

    #[test]
    fn test_single_reading_day_is_insufficient() {
        let table = ReadingTable::new(vec![
            reading(1, 0, "a", 0.0),
            reading(1, 5, "a", 10.0),
            reading(2, 0, "a", 12.0),
        ]);
        let series = EnergyReconciler::default().daily(&table);
        assert_eq!(series.days.len(), 1);
        assert_eq!(series.insufficient.len(), 1);
    }

    #[test]
    fn test_missing_day_estimation_by_day_type() {
        // 2025-01-06 Mon .. 2025-01-12 Sun; data on Mon, Tue, Sat only
        let table = ReadingTable::new(vec![
            reading(6, 0, "a", 0.0),
            reading(6, 23, "a", 100.0),
            reading(7, 0, "a", 100.0),
            reading(7, 23, "a", 300.0),
            reading(11, 0, "a", 300.0),
            reading(11, 23, "a", 340.0),
        ]);
        let reconciler = EnergyReconciler::default();
        let series = reconciler.daily(&table);
        let estimates = reconciler.estimate_missing_days(&series);

        // Wed, Thu, Fri missing between Mon and Sat
        assert_eq!(estimates.len(), 3);
        for e in &estimates {
            assert!(!e.is_weekend);
            assert_relative_eq!(e.energy_kwh, 150.0);
        }
    }

    #[test]
    fn test_missing_day_estimation_omits_empty_day_type() {
        // Only weekdays carry data; the missing Saturday has no weekend basis
        let table = ReadingTable::new(vec![
            reading(10, 0, "a", 0.0),
            reading(10, 23, "a", 100.0),
            reading(13, 0, "a", 100.0),
            reading(13, 23, "a", 180.0),
        ]);
        let reconciler = EnergyReconciler::default();
        let series = reconciler.daily(&table);
        let estimates = reconciler.estimate_missing_days(&series);
        let dates: Vec<u32> = estimates.iter().map(|e| chrono::Datelike::day(&e.date)).collect();
        assert_eq!(dates, Vec::<u32>::new());
        assert_eq!(series.missing_dates().len(), 2);
    }
}
