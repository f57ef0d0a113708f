// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! KPI engine
//!
//! Runs every analyzer over one immutable [`ReadingTable`] and assembles the
//! [`KpiReport`]. Configuration is validated once in [`KpiEngine::new`]; after
//! that a computation cannot fail as a whole, individual KPIs degrade to
//! unavailable instead.

use crate::config::EngineConfig;
use crate::demand::DemandAnalyzer;
use crate::energy::{EnergyReconciler, TableEnergy};
use crate::error::{ConfigError, KpiError, Result};
use crate::fire_risk::FireRiskClassifier;
use crate::freshness::FreshnessMonitor;
use crate::health::{AssetCard, HealthAggregator, HealthInputs};
use crate::kpi::{KpiMap, KpiReport, KpiTables, KpiValue};
use crate::normalizer::Normalizer;
use crate::power_quality::PowerQualityAnalyzer;
use crate::reading::{RawReading, ReadingTable, TodPeriod};
use crate::savings::{SavingsEstimator, SavingsInputs};
use crate::tariff::TariffEngine;
use chrono::NaiveDateTime;
use log::debug;
use std::collections::BTreeMap;

/// Per-call options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiRequest {
    /// Reference time for freshness. Without it freshness is unavailable.
    pub now: Option<NaiveDateTime>,
    /// Add the estimated-days overlay to the tables
    pub estimate_missing_days: bool,
    /// Requested shiftable load fraction, clamped to the configured bounds
    pub shiftable_fraction: Option<f64>,
}

impl KpiRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_estimated_days(mut self, enabled: bool) -> Self {
        self.estimate_missing_days = enabled;
        self
    }

    pub fn with_shiftable_fraction(mut self, fraction: f64) -> Self {
        self.shiftable_fraction = Some(fraction);
        self
    }
}

/// KPI engine
#[derive(Debug, Clone)]
pub struct KpiEngine {
    config: EngineConfig,
    normalizer: Normalizer,
    energy: EnergyReconciler,
    power_quality: PowerQualityAnalyzer,
    fire_risk: FireRiskClassifier,
    tariff: TariffEngine,
    demand: DemandAnalyzer,
    health: HealthAggregator,
    freshness: FreshnessMonitor,
    savings: SavingsEstimator,
}

impl KpiEngine {
    /// Create an engine. Fails when the configuration is malformed.
    pub fn new(config: EngineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(&config.sampling),
            energy: EnergyReconciler::new(&config.energy),
            power_quality: PowerQualityAnalyzer::new(
                &config.power_quality,
                config.sampling.interval_minutes,
            ),
            fire_risk: FireRiskClassifier::new(&config.fire_risk),
            tariff: TariffEngine::new(&config.tariff),
            demand: DemandAnalyzer::new(&config.demand),
            health: HealthAggregator::new(&config.health, &config.power_quality),
            freshness: FreshnessMonitor::new(&config.freshness, &config.sampling),
            savings: SavingsEstimator::new(&config.savings),
            config,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize raw rows, then compute.
    pub fn compute_raw(&self, rows: &[RawReading], request: &KpiRequest) -> KpiReport {
        let normalized = self.normalizer.normalize(rows);
        let mut report = self.compute(&normalized.table, request);
        report.rejected_rows = normalized.rejected.iter().map(|e| e.row()).collect();
        report.kpis.set_count("rejected_rows", normalized.rejected.len());
        report.kpis.set_count("invalid_cells", normalized.invalid_cells);
        report
    }

    /// One independent report per location.
    pub fn compute_per_location(
        &self,
        table: &ReadingTable,
        request: &KpiRequest,
    ) -> BTreeMap<String, KpiReport> {
        table
            .locations()
            .into_iter()
            .map(|location| {
                let subset = table.for_location(location);
                (location.to_string(), self.compute(&subset, request))
            })
            .collect()
    }

    /// Compute the full report for a table.
    pub fn compute(&self, table: &ReadingTable, request: &KpiRequest) -> KpiReport {
        let mut kpis = KpiMap::new();
        let mut tables = KpiTables::default();

        kpis.set_count("total_readings", table.len());
        kpis.set_count("rejected_rows", 0);
        kpis.set_count("locations", table.locations().len());
        match table.data_days() {
            Some(days) => kpis.set_count("data_days", days as usize),
            None => kpis.set_unavailable(
                &["data_days"],
                &KpiError::insufficient("data_days", 1, 0),
            ),
        }

        // Energy
        let energy = self.energy.total(table);
        match &energy {
            Ok(total) => self.energy_kpis(&mut kpis, total),
            Err(e) => {
                debug!("total energy unavailable: {}", e);
                kpis.set_unavailable(
                    &["total_energy_kwh", "energy_resets_detected", "carbon_kg"],
                    e,
                );
            }
        }
        let total_kwh = energy.as_ref().ok().map(|t| t.total_kwh);

        let daily = self.energy.daily(table);
        kpis.set_count("daily_outlier_days", daily.outlier_count());
        kpis.set_count("missing_days", daily.missing_dates().len());
        if daily.is_empty() {
            kpis.set_unavailable(
                &["daily_energy_total_kwh", "daily_energy_avg_kwh"],
                &KpiError::insufficient("daily_energy", 2, 0),
            );
        } else {
            kpis.set_number("daily_energy_total_kwh", daily.aggregate_kwh());
            match daily.average_daily_kwh() {
                Some(avg) => kpis.set_number("daily_energy_avg_kwh", avg),
                None => kpis.set_unavailable(
                    &["daily_energy_avg_kwh"],
                    &KpiError::insufficient("daily_energy", 1, 0),
                ),
            }
        }
        if request.estimate_missing_days {
            tables.estimated_days = Some(self.energy.estimate_missing_days(&daily));
        }
        tables.daily_energy = daily.days;

        // Demand
        let demand = self.demand.analyze(table);
        kpis.set_number("contracted_demand_kw", self.config.demand.contracted_demand_kw);
        match &demand {
            Ok(d) => {
                kpis.set_number("peak_demand_kw", d.peak_kw);
                kpis.set_number("avg_demand_kw", d.avg_kw);
                match d.load_factor_pct {
                    Some(lf) => kpis.set_number("load_factor_pct", lf),
                    None => kpis.set(
                        "load_factor_pct",
                        KpiValue::unavailable("peak demand is zero"),
                    ),
                }
                kpis.set_number("demand_utilization_pct", d.utilization_pct);
                kpis.set_number("load_avg_pct", d.load_avg_pct);
                kpis.set_number("idle_time_pct", d.idle_time_pct);
            }
            Err(e) => kpis.set_unavailable(
                &[
                    "peak_demand_kw",
                    "avg_demand_kw",
                    "load_factor_pct",
                    "demand_utilization_pct",
                    "load_avg_pct",
                    "idle_time_pct",
                ],
                e,
            ),
        }

        // Power quality
        let pq = self.power_quality.analyze(table);
        match &pq.pf {
            Ok(pf) => {
                kpis.set_count("pf_valid_readings", pf.valid_readings);
                kpis.set_number("pf_avg", pf.avg);
                kpis.set_number("pf_min", pf.min);
                kpis.set_number("pf_below_warning_pct", pf.below_warning_pct);
                kpis.set_number("pf_below_alert_pct", pf.below_alert_pct);
            }
            Err(e) => {
                debug!("power factor unavailable: {}", e);
                kpis.set_count("pf_valid_readings", 0);
                kpis.set_unavailable(
                    &["pf_avg", "pf_min", "pf_below_warning_pct", "pf_below_alert_pct"],
                    e,
                );
            }
        }
        match &pq.sustained {
            Ok(s) => {
                kpis.set_count("pf_sustained_alerts", s.alerts());
                kpis.set_number("pf_sustained_minutes", s.minutes);
                kpis.set_text("pf_alert_level", s.level.label());
                tables.pf_events = s.events.clone();
            }
            Err(e) => kpis.set_unavailable(
                &["pf_sustained_alerts", "pf_sustained_minutes", "pf_alert_level"],
                e,
            ),
        }
        match &pq.current_imbalance {
            Ok(i) => {
                kpis.set_number("current_imbalance_max_pct", i.max_pct);
                kpis.set_number("current_imbalance_avg_pct", i.avg_pct);
                kpis.set_count("current_imbalance_warnings", i.warnings);
            }
            Err(e) => kpis.set_unavailable(
                &[
                    "current_imbalance_max_pct",
                    "current_imbalance_avg_pct",
                    "current_imbalance_warnings",
                ],
                e,
            ),
        }
        match &pq.voltage {
            Ok(v) => {
                kpis.set_number("voltage_imbalance_max_pct", v.imbalance.max_pct);
                kpis.set_number("voltage_imbalance_avg_pct", v.imbalance.avg_pct);
                kpis.set_count("voltage_imbalance_warnings", v.imbalance.warnings);
                kpis.set_number("voltage_deviation_max_pct", v.deviation_max_pct);
            }
            Err(e) => kpis.set_unavailable(
                &[
                    "voltage_imbalance_max_pct",
                    "voltage_imbalance_avg_pct",
                    "voltage_imbalance_warnings",
                    "voltage_deviation_max_pct",
                ],
                e,
            ),
        }
        match &pq.frequency {
            Ok(f) => {
                kpis.set_number("freq_min_hz", f.min_hz);
                kpis.set_number("freq_max_hz", f.max_hz);
                kpis.set_count("freq_out_of_band", f.out_of_band);
            }
            Err(e) => kpis.set_unavailable(&["freq_min_hz", "freq_max_hz", "freq_out_of_band"], e),
        }

        // Fire risk
        match self.fire_risk.analyze(table) {
            Ok(fire) => {
                kpis.set_number("neutral_avg_a", fire.neutral_avg_a);
                kpis.set_number("neutral_max_a", fire.neutral_max_a);
                kpis.set_count("fire_safe", fire.counts.safe);
                kpis.set_count("fire_watch", fire.counts.watch);
                kpis.set_count("fire_high", fire.counts.high);
                kpis.set_count("fire_critical", fire.counts.critical);
                kpis.set_count("fire_high_risk_transitions", fire.total_transitions());
                tables.fire_timeline = fire.timeline;
            }
            Err(e) => kpis.set_unavailable(
                &[
                    "neutral_avg_a",
                    "neutral_max_a",
                    "fire_safe",
                    "fire_watch",
                    "fire_high",
                    "fire_critical",
                    "fire_high_risk_transitions",
                ],
                &e,
            ),
        }

        // Time of day
        let peak_energy = self.tod_kpis(&mut kpis, &mut tables, table, &energy, request);
        tables.tod_metered = self.tariff.metered(table);

        // Health
        let health = self.health.report(&HealthInputs {
            pf: pq.pf.as_ref().ok(),
            sustained: pq.sustained.as_ref().ok(),
            current_imbalance: pq.current_imbalance.as_ref().ok(),
            voltage: pq.voltage.as_ref().ok(),
            frequency: pq.frequency.as_ref().ok(),
            demand: demand.as_ref().ok(),
        });
        for card in AssetCard::ALL {
            if let Some(c) = health.get(card) {
                kpis.set_text(card.key(), c.status.label());
            }
        }
        tables.health_cards = health.cards;

        // Savings
        let savings = self.savings.estimate(&SavingsInputs {
            data_days: table.data_days(),
            contracted_kw: self.config.demand.contracted_demand_kw,
            peak_demand_kw: demand.as_ref().ok().map(|d| d.peak_kw),
            avg_pf: pq.pf.as_ref().ok().map(|p| p.avg),
            total_energy_kwh: total_kwh,
            peak_energy_kwh: peak_energy,
            rate_spread: self.config.tariff.rates.peak - self.config.tariff.rates.offpeak,
        });
        match savings {
            Ok(s) => {
                kpis.set_number("savings_monthly_total", s.monthly_total);
                kpis.set_number("savings_realizable_monthly", s.realizable_monthly);
                kpis.set_number("savings_annual", s.annual);
                tables.savings_items = s.items;
            }
            Err(e) => kpis.set_unavailable(
                &["savings_monthly_total", "savings_realizable_monthly", "savings_annual"],
                &e,
            ),
        }

        // Freshness
        match request.now {
            Some(now) => match self.freshness.table(table, now) {
                Ok(f) => {
                    kpis.set_text("freshness", f.state.label());
                    kpis.set_number("minutes_since_last_reading", f.minutes_since_last);
                }
                Err(e) => kpis.set_unavailable(&["freshness", "minutes_since_last_reading"], &e),
            },
            None => {
                let reason = KpiValue::unavailable("no reference time supplied");
                kpis.set("freshness", reason.clone());
                kpis.set("minutes_since_last_reading", reason);
            }
        }
        tables.location_status = self.freshness.locations(table, request.now);

        KpiReport {
            kpis,
            tables,
            rejected_rows: Vec::new(),
        }
    }

    fn energy_kpis(&self, kpis: &mut KpiMap, total: &TableEnergy) {
        kpis.set_number("total_energy_kwh", total.total_kwh);
        kpis.set_count("energy_resets_detected", total.resets());
        kpis.set_number(
            "carbon_kg",
            total.total_kwh * self.config.energy.carbon_factor_kg_per_kwh,
        );
    }

    /// ToD KPIs. Returns the apportioned peak energy when available.
    fn tod_kpis(
        &self,
        kpis: &mut KpiMap,
        tables: &mut KpiTables,
        table: &ReadingTable,
        energy: &Result<TableEnergy>,
        request: &KpiRequest,
    ) -> Option<f64> {
        let fraction = self.tariff.shiftable_fraction(request.shiftable_fraction);
        kpis.set_number("shiftable_fraction", fraction);

        match self.tariff.baseline(table) {
            Ok(b) => kpis.set_number("baseline_kw", b.overall_kw),
            Err(e) => kpis.set_unavailable(&["baseline_kw"], &e),
        }

        let cost_keys = [
            "energy_peak_kwh",
            "energy_normal_kwh",
            "energy_offpeak_kwh",
            "tod_actual_cost",
            "tod_ideal_cost",
            "tod_savings",
            "tod_is_optimal",
            "tod_status",
            "shiftable_energy_kwh",
            "tod_shift_savings",
        ];

        let distribution = match self.tariff.distribution(table) {
            Ok(d) => d,
            Err(e) => {
                kpis.set_count("tod_unclassified_readings", self.tariff.unclassified(table));
                kpis.set_unavailable(&cost_keys, &e);
                return None;
            }
        };
        kpis.set_count("tod_unclassified_readings", distribution.unclassified);

        let total = match energy {
            Ok(t) => t.total_kwh,
            Err(e) => {
                kpis.set_unavailable(&cost_keys, e);
                return None;
            }
        };

        let cost = self.tariff.cost(total, &distribution);
        for period in TodPeriod::ALL {
            kpis.set_number(&format!("energy_{}_kwh", period.key()), cost.energy(period));
        }
        kpis.set_number("tod_actual_cost", cost.actual_cost);
        kpis.set_number("tod_ideal_cost", cost.ideal_cost);
        kpis.set_number("tod_savings", cost.savings);
        kpis.set_flag("tod_is_optimal", cost.is_optimal);
        kpis.set_text("tod_status", cost.status.to_string());

        let plan = self.tariff.shift_plan(&cost, fraction);
        kpis.set_number("shiftable_energy_kwh", plan.shiftable_energy_kwh);
        kpis.set_number("tod_shift_savings", plan.savings);

        let peak = cost.energy(TodPeriod::Peak);
        tables.tod_breakdown = cost.periods;
        Some(peak)
    }
}

/// One-shot helper: validate, normalize and compute.
pub fn compute_kpis(rows: &[RawReading], config: EngineConfig, request: &KpiRequest) -> Result<KpiReport> {
    let engine = KpiEngine::new(config)?;
    Ok(engine.compute_raw(rows, request))
}
