// MeterKPI Testdata - Synthetic meter readings
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # MeterKPI Testdata
//!
//! Synthetic meter reading generator for the MeterKPI engine.
//!
//! Datasets look like a readings sheet export: text cells, sheet headers,
//! several sheds sampled every few minutes. Each [`Scenario`] injects one
//! condition the engine must detect:
//!
//! - **Counter reset**: the energy counter drops to zero mid-window
//! - **Low power factor**: a sustained afternoon dip below 0.90
//! - **Neutral overload**: an hour per evening in the HIGH/CRITICAL tiers
//! - **Missing days**: a whole day without readings
//! - **Night shutdown**: zero load overnight
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meterkpi_testdata::{generate_dataset, GeneratorConfig, Scenario};
//!
//! let config = GeneratorConfig::new()
//!     .with_days(7)
//!     .with_interval_minutes(5)
//!     .with_seed(42);
//!
//! let dataset = generate_dataset(&config, Scenario::LowPowerFactor);
//! dataset.to_csv("readings.csv").unwrap();
//! ```

pub mod dataset;
pub mod generator;
pub mod profile;
pub mod scenario;

// Re-exports for convenience
pub use dataset::{Dataset, DatasetError, DatasetMetadata};
pub use generator::{generate_dataset, GeneratorConfig, TIMESTAMP_FORMAT};
pub use profile::{tod_label, LoadProfile};
pub use scenario::{Scenario, ScenarioExpectation};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
