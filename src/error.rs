//! Error types for the KPI engine
//!
//! Row-level and field-level errors are absorbed by the component that hits
//! them and degrade a single KPI to "unavailable". Only [`ConfigError`] aborts
//! a whole computation.

use std::fmt;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, KpiError>;

/// Main error type for engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KpiError {
    /// A raw row failed normalization
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Not enough readings to compute a metric
    #[error("Insufficient data for {metric}: need {needed}, have {available}")]
    InsufficientData {
        metric: &'static str,
        needed: usize,
        available: usize,
    },

    /// An optional column is absent from every reading that was considered
    #[error("Missing field: {0}")]
    MissingField(Field),

    /// Configuration is malformed
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl KpiError {
    /// Shorthand for [`KpiError::InsufficientData`]
    pub fn insufficient(metric: &'static str, needed: usize, available: usize) -> Self {
        Self::InsufficientData {
            metric,
            needed,
            available,
        }
    }

    /// True for errors that only degrade a single KPI
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// Errors while normalizing a raw row
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Timestamp column empty
    #[error("Row {row}: empty timestamp")]
    EmptyTimestamp { row: usize },

    /// Timestamp text did not match any accepted layout
    #[error("Row {row}: unparseable timestamp {value:?}")]
    InvalidTimestamp { row: usize, value: String },
}

impl ParseError {
    /// Index of the offending row in the raw input
    pub fn row(&self) -> usize {
        match self {
            Self::EmptyTimestamp { row } | Self::InvalidTimestamp { row, .. } => *row,
        }
    }
}

/// Errors in the engine configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value is NaN or infinite
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    /// A value falls outside its allowed range
    #[error("{name} = {value} outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Tier boundaries must strictly increase
    #[error("{name} thresholds must be strictly increasing: {values:?}")]
    NonMonotonic {
        name: &'static str,
        values: Vec<f64>,
    },

    /// Target split does not sum to one
    #[error("Target split must sum to 1.0, got {sum}")]
    InvalidSplit { sum: f64 },

    /// A lower bound is not below its upper bound
    #[error("{name} band is empty: [{low}, {high}]")]
    EmptyBand {
        name: &'static str,
        low: f64,
        high: f64,
    },

    /// A count or duration must be non-zero
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Optional reading columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    PowerKw,
    EnergyKwh,
    PowerFactor,
    CurrentTotal,
    PhaseCurrents,
    NeutralCurrent,
    LineVoltages,
    Frequency,
    TodPeriod,
}

impl Field {
    /// Column name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerKw => "power_kw",
            Self::EnergyKwh => "energy_kwh",
            Self::PowerFactor => "power_factor",
            Self::CurrentTotal => "current_total",
            Self::PhaseCurrents => "current_r/y/b",
            Self::NeutralCurrent => "current_n",
            Self::LineVoltages => "voltage_ry/yb/br",
            Self::Frequency => "frequency",
            Self::TodPeriod => "tod_period",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
