// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Demand and load utilization against the contracted maximum demand.

use crate::config::DemandConfig;
use crate::error::{Field, KpiError, Result};
use crate::reading::ReadingTable;
use crate::stats;
use serde::Serialize;

/// Demand statistics over the readings carrying `power_kw`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandStats {
    pub readings: usize,
    pub contracted_kw: f64,
    pub peak_kw: f64,
    pub avg_kw: f64,
    /// `avg / peak * 100`; absent when the peak is not positive
    pub load_factor_pct: Option<f64>,
    /// `peak / contracted * 100`
    pub utilization_pct: f64,
    /// Mean load as a share of contract (%)
    pub load_avg_pct: f64,
    /// Highest load as a share of contract (%)
    pub load_max_pct: f64,
    /// Readings below the idle load share (%)
    pub idle_time_pct: f64,
    /// Readings drawing more than the contracted demand
    pub above_contract: usize,
}

/// Demand analyzer
#[derive(Debug, Clone, Default)]
pub struct DemandAnalyzer {
    config: DemandConfig,
}

impl DemandAnalyzer {
    pub fn new(config: &DemandConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn analyze(&self, table: &ReadingTable) -> Result<DemandStats> {
        let power: Vec<f64> = table.iter().filter_map(|r| r.power_kw).collect();
        let (Some(peak_kw), Some(avg_kw)) = (stats::max(&power), stats::mean(&power)) else {
            return Err(KpiError::MissingField(Field::PowerKw));
        };

        let contracted_kw = self.config.contracted_demand_kw;
        let load: Vec<f64> = power.iter().map(|kw| kw / contracted_kw * 100.0).collect();

        Ok(DemandStats {
            readings: power.len(),
            contracted_kw,
            peak_kw,
            avg_kw,
            load_factor_pct: (peak_kw > 0.0).then(|| avg_kw / peak_kw * 100.0),
            utilization_pct: peak_kw / contracted_kw * 100.0,
            load_avg_pct: avg_kw / contracted_kw * 100.0,
            load_max_pct: peak_kw / contracted_kw * 100.0,
            idle_time_pct: stats::pct_below(&load, self.config.idle_load_pct).unwrap_or(0.0),
            above_contract: power.iter().filter(|kw| **kw > contracted_kw).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn table(values: &[f64]) -> ReadingTable {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, kw)| {
                let mut r = Reading::new(start + Duration::minutes(5 * i as i64), "a");
                r.power_kw = Some(*kw);
                r
            })
            .collect()
    }

    #[test]
    fn test_demand_stats() {
        let stats = DemandAnalyzer::default()
            .analyze(&table(&[10.0, 100.0, 150.0, 140.0]))
            .unwrap();
        assert_eq!(stats.peak_kw, 150.0);
        assert_relative_eq!(stats.avg_kw, 100.0);
        assert_relative_eq!(stats.load_factor_pct.unwrap(), 100.0 / 150.0 * 100.0);
        assert_relative_eq!(stats.utilization_pct, 75.0);
        assert_relative_eq!(stats.load_avg_pct, 50.0);
        // 10 kW = 5 % of 200 kW contract
        assert_relative_eq!(stats.idle_time_pct, 25.0);
        assert_eq!(stats.above_contract, 0);
    }

    #[test]
    fn test_all_zero_load_has_no_load_factor() {
        let stats = DemandAnalyzer::default().analyze(&table(&[0.0, 0.0])).unwrap();
        assert_eq!(stats.load_factor_pct, None);
        assert_relative_eq!(stats.idle_time_pct, 100.0);
    }

    #[test]
    fn test_missing_power() {
        assert_eq!(
            DemandAnalyzer::default().analyze(&ReadingTable::empty()),
            Err(KpiError::MissingField(Field::PowerKw))
        );
    }
}
