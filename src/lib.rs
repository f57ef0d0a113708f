//! # MeterKPI - Meter telemetry analytics
//!
//! Derives operational KPIs from periodic three-phase meter readings taken at
//! several locations: energy, demand, power factor, neutral-current fire
//! risk, time-of-day tariff cost and asset health.
//!
//! ## Key Features
//!
//! - **Reset-safe energy**: cumulative counters that reset mid-window still
//!   yield a non-negative total
//! - **Noise filtering**: PF statistics ignore idle readings, and only
//!   sustained low-PF runs raise alerts
//! - **Explicit gaps**: a KPI that cannot be computed is reported as
//!   unavailable, never as zero
//! - **Pure and deterministic**: every report is a full recompute from an
//!   immutable table and configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use meterkpi::{EngineConfig, KpiEngine, KpiRequest, RawColumn, RawReading};
//!
//! let engine = KpiEngine::new(EngineConfig::default()).unwrap();
//!
//! let rows = vec![
//!     RawReading::new("2025-01-06 08:00:00", "Shed_01")
//!         .with(RawColumn::EnergyKwh, 1200.0)
//!         .with(RawColumn::PowerKw, 85.0),
//!     RawReading::new("2025-01-06 08:05:00", "Shed_01")
//!         .with(RawColumn::EnergyKwh, 1207.5)
//!         .with(RawColumn::PowerKw, 90.0),
//! ];
//!
//! let report = engine.compute_raw(&rows, &KpiRequest::new());
//! assert_eq!(report.kpis.number("total_energy_kwh"), Some(7.5));
//! assert_eq!(report.kpis.number("peak_demand_kw"), Some(90.0));
//! ```
//!
//! ## Modules
//!
//! - [`reading`]: Raw and typed readings, the reading table
//! - [`normalizer`]: Raw rows to typed readings
//! - [`energy`]: Total and per-day energy, missing-day estimates
//! - [`power_quality`]: PF statistics, sustained events, imbalance
//! - [`fire_risk`]: Neutral-current tiers
//! - [`tariff`]: ToD apportionment, cost and savings
//! - [`demand`]: Demand and load utilization
//! - [`health`]: Asset health cards
//! - [`freshness`]: Data recency
//! - [`savings`]: Monthly savings potential
//! - [`kpi`]: KPI mapping and derived tables
//! - [`engine`]: Orchestration

// Modules
pub mod config;
pub mod demand;
pub mod energy;
pub mod engine;
pub mod error;
pub mod fire_risk;
pub mod freshness;
pub mod health;
pub mod kpi;
pub mod normalizer;
pub mod power_quality;
pub mod reading;
pub mod savings;
pub mod stats;
pub mod tariff;

// Re-exports for convenient access
pub use config::{
    DemandConfig, EnergyConfig, EngineConfig, FireRiskConfig, FreshnessConfig, HealthConfig,
    PeriodValues, PowerQualityConfig, SamplingConfig, SavingsConfig, TariffConfig,
};
pub use demand::{DemandAnalyzer, DemandStats};
pub use energy::{
    counter_delta, CounterDelta, DailyEnergy, DailyEnergySeries, EnergyReconciler, EstimatedDay,
    TableEnergy,
};
pub use engine::{compute_kpis, KpiEngine, KpiRequest};
pub use error::{ConfigError, Field, KpiError, ParseError, Result};
pub use fire_risk::{FireEvent, FireRiskClassifier, FireRiskSummary, FireRiskTier, TierCounts};
pub use freshness::{Freshness, FreshnessMonitor, FreshnessState, LocationStatus};
pub use health::{AssetCard, HealthAggregator, HealthCard, HealthInputs, HealthReport, HealthStatus};
pub use kpi::{KpiMap, KpiReport, KpiTables, KpiValue};
pub use normalizer::{parse_timestamp, Normalized, Normalizer};
pub use power_quality::{
    AlertLevel, FrequencyStats, ImbalanceStats, PfEvent, PfStats, PowerQualityAnalyzer,
    PowerQualityReport, SustainedSummary, VoltageStats,
};
pub use reading::{RawColumn, RawReading, Reading, ReadingTable, ThreePhase, TodLabel, TodPeriod};
pub use savings::{SavingsEstimator, SavingsInputs, SavingsItem, SavingsKind, SavingsPotential};
pub use tariff::{
    Baseline, MeteredBreakdown, MeteredRow, PeriodCost, ShiftPlan, TariffEngine, TodCost,
    TodDistribution, TodStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
