// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Savings potential
//!
//! Monthly estimate built from three independent items, each projected from
//! the observed window to 30 days:
//!
//! - **Demand contract**: a contract well above the observed peak is paid for
//!   every month. The optimal contract is `peak * headroom`.
//! - **PF penalty**: 1 % of the energy bill per 0.01 of average PF below the
//!   benchmark.
//! - **ToD shift**: part of the peak energy moved off-peak at the rate spread.
//!
//! An item whose inputs are unavailable is not estimated.

use crate::config::SavingsConfig;
use crate::error::{KpiError, Result};
use serde::Serialize;
use std::fmt;

/// Days the estimate is normalized to.
const MONTH_DAYS: f64 = 30.0;

/// Kind of savings item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsKind {
    DemandContract,
    PowerFactor,
    TodShift,
}

impl fmt::Display for SavingsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DemandContract => "demand_contract",
            Self::PowerFactor => "power_factor",
            Self::TodShift => "tod_shift",
        })
    }
}

/// One monthly savings item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsItem {
    pub kind: SavingsKind,
    /// Currency per month
    pub monthly: f64,
    pub detail: String,
}

/// Upstream values the estimate draws on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavingsInputs {
    pub data_days: Option<i64>,
    pub contracted_kw: f64,
    pub peak_demand_kw: Option<f64>,
    pub avg_pf: Option<f64>,
    pub total_energy_kwh: Option<f64>,
    pub peak_energy_kwh: Option<f64>,
    /// `rate(PEAK) - rate(OFFPEAK)`
    pub rate_spread: f64,
}

/// Savings estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsPotential {
    /// `30 / data_days`
    pub monthly_factor: f64,
    pub items: Vec<SavingsItem>,
    /// Sum of retained items
    pub monthly_total: f64,
    /// `monthly_total * realization_factor`
    pub realizable_monthly: f64,
    /// Realizable amount scaled back to the observed window
    pub period: f64,
    pub annual: f64,
}

/// Savings estimator
#[derive(Debug, Clone, Default)]
pub struct SavingsEstimator {
    config: SavingsConfig,
}

impl SavingsEstimator {
    pub fn new(config: &SavingsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn estimate(&self, inputs: &SavingsInputs) -> Result<SavingsPotential> {
        let days = match inputs.data_days {
            Some(d) if d > 0 => d as f64,
            _ => return Err(KpiError::insufficient("savings", 1, 0)),
        };
        let monthly_factor = MONTH_DAYS / days;

        let items: Vec<SavingsItem> = [
            self.demand_contract(inputs),
            self.power_factor(inputs, monthly_factor),
            self.tod_shift(inputs, monthly_factor),
        ]
        .into_iter()
        .flatten()
        .filter(|item| item.monthly > self.config.min_item_savings)
        .collect();

        let monthly_total: f64 = items.iter().map(|i| i.monthly).sum();
        let realizable_monthly = monthly_total * self.config.realization_factor;
        Ok(SavingsPotential {
            monthly_factor,
            items,
            monthly_total,
            realizable_monthly,
            period: realizable_monthly * days / MONTH_DAYS,
            annual: realizable_monthly * 12.0,
        })
    }

    fn demand_contract(&self, inputs: &SavingsInputs) -> Option<SavingsItem> {
        let peak = inputs.peak_demand_kw.filter(|p| *p > 0.0)?;
        let contracted = inputs.contracted_kw;
        let optimal = peak * self.config.contract_headroom;
        if optimal >= contracted * self.config.contract_reduce_trigger {
            return None;
        }
        let monthly = (contracted - optimal) / self.config.assumed_pf * self.config.demand_charge_per_kva;
        Some(SavingsItem {
            kind: SavingsKind::DemandContract,
            monthly,
            detail: format!(
                "reduce contract {:.0}% to {:.0} kW",
                (contracted - optimal) / contracted * 100.0,
                optimal
            ),
        })
    }

    fn power_factor(&self, inputs: &SavingsInputs, monthly_factor: f64) -> Option<SavingsItem> {
        let pf = inputs.avg_pf.filter(|pf| *pf > 0.0)?;
        let benchmark = self.config.pf_benchmark;
        if pf >= benchmark {
            return None;
        }
        let monthly_energy = inputs.total_energy_kwh? * monthly_factor;
        let bill = monthly_energy * self.config.blended_rate;
        // 1 % per 0.01 below benchmark
        let penalty_pct = (benchmark - pf) * 100.0;
        Some(SavingsItem {
            kind: SavingsKind::PowerFactor,
            monthly: bill * penalty_pct / 100.0,
            detail: format!("improve PF from {:.2} to {:.2}", pf, benchmark),
        })
    }

    fn tod_shift(&self, inputs: &SavingsInputs, monthly_factor: f64) -> Option<SavingsItem> {
        let peak_energy = inputs.peak_energy_kwh.filter(|e| *e > 0.0)?;
        let shifted = peak_energy * monthly_factor * self.config.peak_shift_fraction;
        Some(SavingsItem {
            kind: SavingsKind::TodShift,
            monthly: shifted * inputs.rate_spread,
            detail: format!("shift {:.0} kWh/month from peak", shifted),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs() -> SavingsInputs {
        SavingsInputs {
            data_days: Some(15),
            contracted_kw: 200.0,
            peak_demand_kw: Some(100.0),
            avg_pf: Some(0.87),
            total_energy_kwh: Some(10_000.0),
            peak_energy_kwh: Some(2_000.0),
            rate_spread: 7.14 - 5.18,
        }
    }

    #[test]
    fn test_all_items() {
        let potential = SavingsEstimator::default().estimate(&inputs()).unwrap();
        assert_relative_eq!(potential.monthly_factor, 2.0);
        assert_eq!(potential.items.len(), 3);

        // (200 - 120) / 0.9 * 350
        assert_relative_eq!(potential.items[0].monthly, 80.0 / 0.9 * 350.0, epsilon = 1e-6);
        // 20000 kWh * 6.50 * 5 %
        assert_relative_eq!(potential.items[1].monthly, 6_500.0, epsilon = 1e-6);
        // 4000 * 0.5 * 1.96
        assert_relative_eq!(potential.items[2].monthly, 3_920.0, epsilon = 1e-6);

        assert_relative_eq!(
            potential.realizable_monthly,
            potential.monthly_total * 0.5,
            epsilon = 1e-9
        );
        assert_relative_eq!(potential.annual, potential.realizable_monthly * 12.0, epsilon = 1e-9);
        assert_relative_eq!(potential.period, potential.realizable_monthly / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_contract_near_peak_is_not_reduced() {
        let mut i = inputs();
        i.peak_demand_kw = Some(150.0);
        let potential = SavingsEstimator::default().estimate(&i).unwrap();
        assert!(potential
            .items
            .iter()
            .all(|item| item.kind != SavingsKind::DemandContract));
    }

    #[test]
    fn test_unavailable_inputs_skip_items() {
        let i = SavingsInputs {
            data_days: Some(30),
            contracted_kw: 200.0,
            rate_spread: 1.96,
            ..Default::default()
        };
        let potential = SavingsEstimator::default().estimate(&i).unwrap();
        assert!(potential.items.is_empty());
        assert_eq!(potential.monthly_total, 0.0);
    }

    #[test]
    fn test_small_items_dropped() {
        let mut i = inputs();
        i.peak_demand_kw = None;
        i.avg_pf = Some(0.95);
        i.peak_energy_kwh = Some(10.0);
        let potential = SavingsEstimator::default().estimate(&i).unwrap();
        assert!(potential.items.is_empty());
    }

    #[test]
    fn test_no_window() {
        let mut i = inputs();
        i.data_days = None;
        assert!(SavingsEstimator::default().estimate(&i).is_err());
    }
}
