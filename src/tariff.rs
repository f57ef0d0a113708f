// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Time-of-day tariff analysis
//!
//! Readings do not carry per-interval energy split by period, so the window's
//! total energy is apportioned by each period's share of *reading count*:
//!
//! ```text
//! energy(p) = total_energy * count(p) / count(all classified)
//! ```
//!
//! This is exact only for evenly spaced readings. Irregular sampling skews it
//! towards periods that were sampled more often. The metered breakdown
//! ([`TariffEngine::metered`]) integrates the counter per period instead and
//! is kept as a separate display table.

use crate::config::{PeriodValues, TariffConfig};
use crate::error::{Field, KpiError, Result};
use crate::reading::{ReadingTable, TodLabel, TodPeriod};
use crate::stats;
use chrono::Datelike;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance when comparing shares against the target split.
const SHARE_EPSILON: f64 = 1e-9;

/// Readings per period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodCounts {
    pub peak: usize,
    pub normal: usize,
    pub offpeak: usize,
}

impl PeriodCounts {
    pub fn get(&self, period: TodPeriod) -> usize {
        match period {
            TodPeriod::Peak => self.peak,
            TodPeriod::Normal => self.normal,
            TodPeriod::OffPeak => self.offpeak,
        }
    }

    fn add(&mut self, period: TodPeriod) {
        match period {
            TodPeriod::Peak => self.peak += 1,
            TodPeriod::Normal => self.normal += 1,
            TodPeriod::OffPeak => self.offpeak += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.peak + self.normal + self.offpeak
    }
}

/// Reading-count distribution over the tariff periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodDistribution {
    pub counts: PeriodCounts,
    /// Readings whose label matched no period
    pub unclassified: usize,
}

impl TodDistribution {
    /// Share of classified readings in each period (0-1)
    pub fn shares(&self) -> PeriodValues {
        let total = self.counts.total() as f64;
        let share = |p| self.counts.get(p) as f64 / total;
        PeriodValues::new(
            share(TodPeriod::Peak),
            share(TodPeriod::Normal),
            share(TodPeriod::OffPeak),
        )
    }
}

/// Optimal when the split meets the target on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TodStatus {
    Optimal,
    Opportunity,
}

impl fmt::Display for TodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Optimal => "OPTIMAL",
            Self::Opportunity => "OPPORTUNITY",
        })
    }
}

/// One period of the cost breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodCost {
    pub period: TodPeriod,
    pub readings: usize,
    pub actual_share: f64,
    pub target_share: f64,
    pub energy_kwh: f64,
    pub rate: f64,
    pub actual_cost: f64,
    pub ideal_cost: f64,
}

/// Actual vs target-split cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodCost {
    pub total_energy_kwh: f64,
    pub periods: Vec<PeriodCost>,
    pub actual_cost: f64,
    pub ideal_cost: f64,
    /// `actual - ideal`; positive means money left on the table
    pub savings: f64,
    pub is_optimal: bool,
    pub status: TodStatus,
}

impl TodCost {
    /// Apportioned energy for a period
    pub fn energy(&self, period: TodPeriod) -> f64 {
        self.periods
            .iter()
            .find(|p| p.period == period)
            .map_or(0.0, |p| p.energy_kwh)
    }
}

/// Low-load baseline from positive power readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Baseline {
    pub overall_kw: f64,
    /// Same percentile within each period that has positive readings
    pub per_period: BTreeMap<TodPeriod, f64>,
}

/// Peak energy that could move off-peak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftPlan {
    pub fraction: f64,
    pub peak_energy_kwh: f64,
    pub shiftable_energy_kwh: f64,
    /// `shiftable * (rate(PEAK) - rate(OFFPEAK))`
    pub savings: f64,
}

/// Metered energy for one (bucket, period) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeteredRow {
    /// ISO week (`2025-W02`) or month (`2025-01`)
    pub bucket: String,
    pub period: TodPeriod,
    pub energy_kwh: f64,
}

/// Weekly and monthly metered breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeteredBreakdown {
    pub weekly: Vec<MeteredRow>,
    pub monthly: Vec<MeteredRow>,
}

/// ToD tariff engine
#[derive(Debug, Clone, Default)]
pub struct TariffEngine {
    config: TariffConfig,
}

impl TariffEngine {
    pub fn new(config: &TariffConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Readings whose label is present but names no known period.
    pub fn unclassified(&self, table: &ReadingTable) -> usize {
        table
            .iter()
            .filter(|r| matches!(r.tod, Some(TodLabel::Unrecognized(_))))
            .count()
    }

    /// Count readings per normalized period.
    pub fn distribution(&self, table: &ReadingTable) -> Result<TodDistribution> {
        let mut counts = PeriodCounts::default();
        let mut unclassified = 0;
        for reading in table.iter() {
            match &reading.tod {
                Some(TodLabel::Known(period)) => counts.add(*period),
                Some(TodLabel::Unrecognized(_)) => unclassified += 1,
                None => {}
            }
        }
        if counts.total() == 0 {
            return Err(KpiError::MissingField(Field::TodPeriod));
        }
        Ok(TodDistribution {
            counts,
            unclassified,
        })
    }

    /// Apportion `total_kwh` by the distribution and price it.
    pub fn cost(&self, total_kwh: f64, distribution: &TodDistribution) -> TodCost {
        let shares = distribution.shares();
        let rates = &self.config.rates;
        let target = &self.config.target_split;

        let periods: Vec<PeriodCost> = TodPeriod::ALL
            .iter()
            .map(|&period| {
                let energy_kwh = total_kwh * shares.get(period);
                let rate = rates.get(period);
                PeriodCost {
                    period,
                    readings: distribution.counts.get(period),
                    actual_share: shares.get(period),
                    target_share: target.get(period),
                    energy_kwh,
                    rate,
                    actual_cost: energy_kwh * rate,
                    ideal_cost: total_kwh * target.get(period) * rate,
                }
            })
            .collect();

        let actual_cost: f64 = periods.iter().map(|p| p.actual_cost).sum();
        let ideal_cost: f64 = periods.iter().map(|p| p.ideal_cost).sum();
        let is_optimal = shares.offpeak + SHARE_EPSILON >= target.offpeak
            && shares.peak <= target.peak + SHARE_EPSILON;

        TodCost {
            total_energy_kwh: total_kwh,
            periods,
            actual_cost,
            ideal_cost,
            savings: actual_cost - ideal_cost,
            is_optimal,
            status: if is_optimal {
                TodStatus::Optimal
            } else {
                TodStatus::Opportunity
            },
        }
    }

    /// Configured percentile of positive load, overall and per period.
    pub fn baseline(&self, table: &ReadingTable) -> Result<Baseline> {
        let min_kw = self.config.baseline_min_kw;
        let q = self.config.baseline_percentile;

        let mut any_power = false;
        let mut overall = Vec::new();
        let mut by_period: BTreeMap<TodPeriod, Vec<f64>> = BTreeMap::new();
        for reading in table.iter() {
            let Some(kw) = reading.power_kw else {
                continue;
            };
            any_power = true;
            if kw <= min_kw {
                continue;
            }
            overall.push(kw);
            if let Some(period) = reading.tod_period() {
                by_period.entry(period).or_default().push(kw);
            }
        }

        if !any_power {
            return Err(KpiError::MissingField(Field::PowerKw));
        }
        let overall_kw =
            stats::quantile(&overall, q).ok_or_else(|| KpiError::insufficient("baseline", 1, 0))?;
        let per_period = by_period
            .into_iter()
            .filter_map(|(period, values)| Some((period, stats::quantile(&values, q)?)))
            .collect();

        Ok(Baseline {
            overall_kw,
            per_period,
        })
    }

    /// Shiftable fraction to use, clamped to the configured bounds.
    pub fn shiftable_fraction(&self, requested: Option<f64>) -> f64 {
        let (min, max) = (self.config.shiftable_min, self.config.shiftable_max);
        match requested {
            None => self.config.shiftable_default,
            Some(f) if f.is_nan() => {
                warn!("shiftable fraction is NaN, using default {}", self.config.shiftable_default);
                self.config.shiftable_default
            }
            Some(f) if f < min || f > max => {
                let clamped = f.clamp(min, max);
                warn!("shiftable fraction {} outside [{}, {}], using {}", f, min, max, clamped);
                clamped
            }
            Some(f) => f,
        }
    }

    /// Peak energy movable off-peak and what it would save.
    pub fn shift_plan(&self, cost: &TodCost, fraction: f64) -> ShiftPlan {
        let peak_energy_kwh = cost.energy(TodPeriod::Peak);
        let shiftable_energy_kwh = peak_energy_kwh * fraction;
        let spread = self.config.rates.peak - self.config.rates.offpeak;
        ShiftPlan {
            fraction,
            peak_energy_kwh,
            shiftable_energy_kwh,
            savings: shiftable_energy_kwh * spread,
        }
    }

    /// Energy per period from counter increments, by ISO week and by month.
    ///
    /// Each location is walked in time order. A positive counter difference
    /// is credited to a period only when both readings fall on the same date
    /// and carry that period; intervals spanning a period boundary, midnight
    /// or a counter reset contribute nothing.
    pub fn metered(&self, table: &ReadingTable) -> MeteredBreakdown {
        let mut weekly: BTreeMap<(String, TodPeriod), f64> = BTreeMap::new();
        let mut monthly: BTreeMap<(String, TodPeriod), f64> = BTreeMap::new();

        for readings in table.by_location().into_values() {
            for w in readings.windows(2) {
                let (prev, next) = (w[0], w[1]);
                let (Some(period), Some(next_period)) = (prev.tod_period(), next.tod_period())
                else {
                    continue;
                };
                let (Some(from), Some(to)) = (prev.energy_kwh, next.energy_kwh) else {
                    continue;
                };
                let date = prev.date();
                if period != next_period || date != next.date() || to <= from {
                    continue;
                }

                let kwh = to - from;
                let week = date.iso_week();
                *weekly
                    .entry((format!("{}-W{:02}", week.year(), week.week()), period))
                    .or_insert(0.0) += kwh;
                *monthly
                    .entry((format!("{}-{:02}", date.year(), date.month()), period))
                    .or_insert(0.0) += kwh;
            }
        }

        let rows = |map: BTreeMap<(String, TodPeriod), f64>| -> Vec<MeteredRow> {
            map.into_iter()
                .map(|((bucket, period), energy_kwh)| MeteredRow {
                    bucket,
                    period,
                    energy_kwh,
                })
                .collect()
        };
        MeteredBreakdown {
            weekly: rows(weekly),
            monthly: rows(monthly),
        }
    }
}
