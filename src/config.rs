// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.
//!
//! Every threshold and rate the engine uses lives here and is supplied by the
//! caller. Defaults match a 200 kW HT industrial connection sampled every
//! 5 minutes. Deployments that differ only by a constant (for example the
//! daily outlier cap) share one engine and change the value here.

use crate::error::ConfigError;
use crate::reading::TodPeriod;
use serde::{Deserialize, Serialize};

/// Master configuration for the KPI engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Sampling cadence and row defaults.
    pub sampling: SamplingConfig,

    /// Energy reconciliation.
    pub energy: EnergyConfig,

    /// Power factor, imbalance and frequency analysis.
    pub power_quality: PowerQualityConfig,

    /// Neutral-current tiers.
    pub fire_risk: FireRiskConfig,

    /// Time-of-day tariff.
    pub tariff: TariffConfig,

    /// Contracted demand and load bands.
    pub demand: DemandConfig,

    /// Asset health card thresholds.
    pub health: HealthConfig,

    /// Data recency states.
    pub freshness: FreshnessConfig,

    /// Savings potential assumptions.
    pub savings: SavingsConfig,
}

impl EngineConfig {
    /// Validate every section. The first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampling.validate()?;
        self.energy.validate()?;
        self.power_quality.validate()?;
        self.fire_risk.validate()?;
        self.tariff.validate()?;
        self.demand.validate()?;
        self.health.validate()?;
        self.freshness.validate()?;
        self.savings.validate()
    }
}

/// Sampling cadence and row defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Nominal interval between readings of one location (minutes).
    pub interval_minutes: u32,

    /// Extra slack before a longer interval counts as a gap (minutes).
    pub gap_tolerance_minutes: u32,

    /// Location assigned to rows that carry none.
    pub default_location: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            gap_tolerance_minutes: 2,
            default_location: "main".to_string(),
        }
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_minutes == 0 {
            return Err(ConfigError::Zero {
                name: "sampling.interval_minutes",
            });
        }
        Ok(())
    }
}

/// Energy reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnergyConfig {
    /// Per-day energy above this value is flagged as an outlier (kWh).
    pub daily_outlier_cap_kwh: f64,

    /// Grid emission factor for the carbon estimate (kg CO2 per kWh).
    pub carbon_factor_kg_per_kwh: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            daily_outlier_cap_kwh: 10_000.0,
            carbon_factor_kg_per_kwh: 0.85,
        }
    }
}

impl EnergyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("energy.daily_outlier_cap_kwh", self.daily_outlier_cap_kwh)?;
        non_negative(
            "energy.carbon_factor_kg_per_kwh",
            self.carbon_factor_kg_per_kwh,
        )
    }
}

/// Power quality analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PowerQualityConfig {
    /// Readings at or below this total current are ignored for PF (A).
    pub min_valid_current_a: f64,

    /// Upper PF threshold (percentage of readings below it is reported).
    pub pf_warning: f64,

    /// Lower PF threshold (percentage of readings below it is reported).
    pub pf_alert: f64,

    /// PF below this value starts or extends a low-PF run.
    pub sustained_threshold: f64,

    /// Minimum run length (readings) for a sustained alert.
    pub sustained_min_readings: usize,

    /// Highest sustained-alert count still classified as "monitor".
    pub monitor_max_alerts: usize,

    /// Current imbalance above this is a warning (%).
    pub current_imbalance_warning_pct: f64,

    /// Voltage imbalance above this is a warning (%).
    pub voltage_imbalance_warning_pct: f64,

    /// Nominal line-to-line voltage (V).
    pub nominal_voltage_v: f64,

    /// Lower edge of the normal frequency band (Hz).
    pub frequency_low_hz: f64,

    /// Upper edge of the normal frequency band (Hz).
    pub frequency_high_hz: f64,
}

impl Default for PowerQualityConfig {
    fn default() -> Self {
        Self {
            min_valid_current_a: 1.0,
            pf_warning: 0.92,
            pf_alert: 0.90,
            sustained_threshold: 0.90,
            sustained_min_readings: 3, // 15 minutes at 5-minute sampling
            monitor_max_alerts: 3,
            current_imbalance_warning_pct: 10.0,
            voltage_imbalance_warning_pct: 2.0,
            nominal_voltage_v: 415.0,
            frequency_low_hz: 49.5,
            frequency_high_hz: 50.5,
        }
    }
}

impl PowerQualityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("power_quality.min_valid_current_a", self.min_valid_current_a)?;
        unit_interval("power_quality.pf_warning", self.pf_warning)?;
        unit_interval("power_quality.pf_alert", self.pf_alert)?;
        unit_interval("power_quality.sustained_threshold", self.sustained_threshold)?;
        if self.sustained_min_readings == 0 {
            return Err(ConfigError::Zero {
                name: "power_quality.sustained_min_readings",
            });
        }
        non_negative(
            "power_quality.current_imbalance_warning_pct",
            self.current_imbalance_warning_pct,
        )?;
        non_negative(
            "power_quality.voltage_imbalance_warning_pct",
            self.voltage_imbalance_warning_pct,
        )?;
        positive("power_quality.nominal_voltage_v", self.nominal_voltage_v)?;
        band(
            "power_quality.frequency",
            self.frequency_low_hz,
            self.frequency_high_hz,
        )
    }
}

/// Neutral-current tier boundaries (A). Each boundary belongs to the higher tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FireRiskConfig {
    /// Start of WATCH.
    pub watch_a: f64,
    /// Start of HIGH.
    pub high_a: f64,
    /// Start of CRITICAL.
    pub critical_a: f64,
}

impl Default for FireRiskConfig {
    fn default() -> Self {
        Self {
            watch_a: 5.0,
            high_a: 10.0,
            critical_a: 20.0,
        }
    }
}

impl FireRiskConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("fire_risk.watch_a", self.watch_a)?;
        increasing(
            "fire_risk",
            &[self.watch_a, self.high_a, self.critical_a],
        )
    }
}

/// One value per ToD period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeriodValues {
    pub peak: f64,
    pub normal: f64,
    pub offpeak: f64,
}

impl PeriodValues {
    pub fn new(peak: f64, normal: f64, offpeak: f64) -> Self {
        Self {
            peak,
            normal,
            offpeak,
        }
    }

    /// Value for a period
    pub fn get(&self, period: TodPeriod) -> f64 {
        match period {
            TodPeriod::Peak => self.peak,
            TodPeriod::Normal => self.normal,
            TodPeriod::OffPeak => self.offpeak,
        }
    }

    /// Sum over the three periods
    pub fn sum(&self) -> f64 {
        self.peak + self.normal + self.offpeak
    }
}

/// Time-of-day tariff settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TariffConfig {
    /// Energy rate per period (currency per kWh).
    pub rates: PeriodValues,

    /// Desired share of energy per period. Must sum to 1.
    pub target_split: PeriodValues,

    /// Percentile of positive load used as the baseline (0-1).
    pub baseline_percentile: f64,

    /// Loads at or below this are treated as shutdown for the baseline (kW).
    pub baseline_min_kw: f64,

    /// Smallest shiftable fraction a caller may request.
    pub shiftable_min: f64,

    /// Largest shiftable fraction a caller may request.
    pub shiftable_max: f64,

    /// Shiftable fraction used when the caller supplies none.
    pub shiftable_default: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            rates: PeriodValues::new(7.14, 6.30, 5.18),
            target_split: PeriodValues::new(0.20, 0.40, 0.40),
            baseline_percentile: 0.10,
            baseline_min_kw: 0.01,
            shiftable_min: 0.20,
            shiftable_max: 0.60,
            shiftable_default: 0.35,
        }
    }
}

impl TariffConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("tariff.rates.peak", self.rates.peak)?;
        non_negative("tariff.rates.normal", self.rates.normal)?;
        non_negative("tariff.rates.offpeak", self.rates.offpeak)?;
        unit_interval("tariff.target_split.peak", self.target_split.peak)?;
        unit_interval("tariff.target_split.normal", self.target_split.normal)?;
        unit_interval("tariff.target_split.offpeak", self.target_split.offpeak)?;
        let sum = self.target_split.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidSplit { sum });
        }
        unit_interval("tariff.baseline_percentile", self.baseline_percentile)?;
        non_negative("tariff.baseline_min_kw", self.baseline_min_kw)?;
        unit_interval("tariff.shiftable_min", self.shiftable_min)?;
        unit_interval("tariff.shiftable_max", self.shiftable_max)?;
        band("tariff.shiftable", self.shiftable_min, self.shiftable_max)?;
        in_range(
            "tariff.shiftable_default",
            self.shiftable_default,
            self.shiftable_min,
            self.shiftable_max,
        )
    }
}

/// Contracted demand and load bands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemandConfig {
    /// Contracted maximum demand (kW).
    pub contracted_demand_kw: f64,

    /// Readings whose load is below this share of contract count as idle (%).
    pub idle_load_pct: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            contracted_demand_kw: 200.0,
            idle_load_pct: 10.0,
        }
    }
}

impl DemandConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("demand.contracted_demand_kw", self.contracted_demand_kw)?;
        in_range("demand.idle_load_pct", self.idle_load_pct, 0.0, 100.0)
    }
}

/// Asset health card thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Worst voltage deviation below this is good (%).
    pub voltage_deviation_good_pct: f64,

    /// Worst voltage deviation at or above this is critical (%).
    pub voltage_deviation_critical_pct: f64,

    /// Average current imbalance below this is good (%).
    pub current_imbalance_good_pct: f64,

    /// Average current imbalance at or above this is critical (%).
    pub current_imbalance_critical_pct: f64,

    /// Lower edge of the optimal utilization band (%).
    pub utilization_optimal_low_pct: f64,

    /// Upper edge of the optimal utilization band (%).
    pub utilization_optimal_high_pct: f64,

    /// Peak utilization above this is critical (%).
    pub utilization_critical_pct: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            voltage_deviation_good_pct: 5.0,
            voltage_deviation_critical_pct: 10.0,
            current_imbalance_good_pct: 15.0,
            current_imbalance_critical_pct: 25.0,
            utilization_optimal_low_pct: 60.0,
            utilization_optimal_high_pct: 80.0,
            utilization_critical_pct: 100.0,
        }
    }
}

impl HealthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative(
            "health.voltage_deviation_good_pct",
            self.voltage_deviation_good_pct,
        )?;
        band(
            "health.voltage_deviation",
            self.voltage_deviation_good_pct,
            self.voltage_deviation_critical_pct,
        )?;
        non_negative(
            "health.current_imbalance_good_pct",
            self.current_imbalance_good_pct,
        )?;
        band(
            "health.current_imbalance",
            self.current_imbalance_good_pct,
            self.current_imbalance_critical_pct,
        )?;
        increasing(
            "health.utilization",
            &[
                self.utilization_optimal_low_pct,
                self.utilization_optimal_high_pct,
                self.utilization_critical_pct,
            ],
        )
    }
}

/// Freshness state boundaries (minutes since the latest reading).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FreshnessConfig {
    /// LIVE while elapsed <= this.
    pub live_max_minutes: f64,
    /// DELAYED while elapsed <= this, OFFLINE beyond.
    pub delayed_max_minutes: f64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            live_max_minutes: 10.0,
            delayed_max_minutes: 30.0,
        }
    }
}

impl FreshnessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("freshness.live_max_minutes", self.live_max_minutes)?;
        increasing(
            "freshness",
            &[self.live_max_minutes, self.delayed_max_minutes],
        )
    }
}

/// Assumptions behind the savings-potential estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SavingsConfig {
    /// Demand charge (currency per kVA per month).
    pub demand_charge_per_kva: f64,

    /// PF used to convert kW contract values into kVA.
    pub assumed_pf: f64,

    /// Optimal contract = peak demand * headroom.
    pub contract_headroom: f64,

    /// Contract reduction is proposed only below contracted * this.
    pub contract_reduce_trigger: f64,

    /// PF below this attracts a penalty of 1 % of the bill per 0.01.
    pub pf_benchmark: f64,

    /// Blended energy rate for the PF-penalty bill (currency per kWh).
    pub blended_rate: f64,

    /// Share of peak energy assumed movable for the savings estimate.
    pub peak_shift_fraction: f64,

    /// Share of the gross potential considered realizable.
    pub realization_factor: f64,

    /// Items below this monthly amount are dropped (currency).
    pub min_item_savings: f64,
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            demand_charge_per_kva: 350.0,
            assumed_pf: 0.9,
            contract_headroom: 1.2,
            contract_reduce_trigger: 0.8,
            pf_benchmark: 0.92,
            blended_rate: 6.50,
            peak_shift_fraction: 0.5,
            realization_factor: 0.5,
            min_item_savings: 100.0,
        }
    }
}

impl SavingsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("savings.demand_charge_per_kva", self.demand_charge_per_kva)?;
        positive("savings.assumed_pf", self.assumed_pf)?;
        unit_interval("savings.assumed_pf", self.assumed_pf)?;
        positive("savings.contract_headroom", self.contract_headroom)?;
        unit_interval("savings.contract_reduce_trigger", self.contract_reduce_trigger)?;
        unit_interval("savings.pf_benchmark", self.pf_benchmark)?;
        non_negative("savings.blended_rate", self.blended_rate)?;
        unit_interval("savings.peak_shift_fraction", self.peak_shift_fraction)?;
        unit_interval("savings.realization_factor", self.realization_factor)?;
        non_negative("savings.min_item_savings", self.min_item_savings)
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { name, value })
    }
}

fn in_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(name, value)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    in_range(name, value, 0.0, f64::MAX)
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    non_negative(name, value)?;
    if value == 0.0 {
        return Err(ConfigError::Zero { name });
    }
    Ok(())
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    in_range(name, value, 0.0, 1.0)
}

fn band(name: &'static str, low: f64, high: f64) -> Result<(), ConfigError> {
    finite(name, low)?;
    finite(name, high)?;
    if low >= high {
        return Err(ConfigError::EmptyBand { name, low, high });
    }
    Ok(())
}

fn increasing(name: &'static str, values: &[f64]) -> Result<(), ConfigError> {
    for v in values {
        finite(name, *v)?;
    }
    if values.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::NonMonotonic {
            name,
            values: values.to_vec(),
        });
    }
    Ok(())
}
