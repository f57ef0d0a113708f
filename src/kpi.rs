// MeterKPI - Meter telemetry analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! KPI mapping and derived tables
//!
//! A [`KpiReport`] is produced fresh for every computation and is read-only
//! once built. Failed KPIs are stored as [`KpiValue::Unavailable`] with the
//! reason, so a missing value can never be mistaken for a real zero.

use crate::energy::{DailyEnergy, EstimatedDay};
use crate::error::KpiError;
use crate::fire_risk::FireEvent;
use crate::freshness::LocationStatus;
use crate::health::HealthCard;
use crate::power_quality::PfEvent;
use crate::savings::SavingsItem;
use crate::tariff::{MeteredBreakdown, PeriodCost};
use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// A single KPI value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Count(usize),
    Flag(bool),
    Text(String),
    Unavailable { unavailable: String },
}

impl KpiValue {
    /// Unavailable with a reason
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            unavailable: reason.into(),
        }
    }

    /// Finite number, or unavailable
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Self::Number(value)
        } else {
            Self::unavailable(format!("non-finite result {}", value))
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Count(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<&KpiError> for KpiValue {
    fn from(err: &KpiError) -> Self {
        Self::unavailable(err.to_string())
    }
}

impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{:.3}", v),
            Self::Count(n) => write!(f, "{}", n),
            Self::Flag(b) => write!(f, "{}", b),
            Self::Text(s) => f.write_str(s),
            Self::Unavailable { unavailable } => write!(f, "unavailable ({})", unavailable),
        }
    }
}

/// Ordered key to value mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KpiMap {
    values: BTreeMap<String, KpiValue>,
}

impl KpiMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, key: &str, value: KpiValue) {
        self.values.insert(key.to_string(), value);
    }

    pub(crate) fn set_number(&mut self, key: &str, value: f64) {
        self.set(key, KpiValue::number(value));
    }

    pub(crate) fn set_count(&mut self, key: &str, value: usize) {
        self.set(key, KpiValue::Count(value));
    }

    pub(crate) fn set_flag(&mut self, key: &str, value: bool) {
        self.set(key, KpiValue::Flag(value));
    }

    pub(crate) fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, KpiValue::Text(value.into()));
    }

    /// Mark every key as unavailable for the same reason
    pub(crate) fn set_unavailable(&mut self, keys: &[&str], err: &KpiError) {
        for key in keys {
            self.set(key, KpiValue::from(err));
        }
    }

    pub fn get(&self, key: &str) -> Option<&KpiValue> {
        self.values.get(key)
    }

    /// Numeric value, `None` when absent or unavailable
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(KpiValue::as_f64)
    }

    pub fn count(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(KpiValue::as_count)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(KpiValue::as_flag)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(KpiValue::as_text)
    }

    pub fn is_unavailable(&self, key: &str) -> bool {
        self.get(key).is_some_and(KpiValue::is_unavailable)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, KpiValue> {
        self.values.iter()
    }

    /// Keys whose value is unavailable
    pub fn unavailable_keys(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(_, v)| v.is_unavailable())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl<'a> IntoIterator for &'a KpiMap {
    type Item = (&'a String, &'a KpiValue);
    type IntoIter = btree_map::Iter<'a, String, KpiValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Derived tables for presentation and reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiTables {
    pub daily_energy: Vec<DailyEnergy>,
    /// Present only when estimation was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<Vec<EstimatedDay>>,
    pub tod_breakdown: Vec<PeriodCost>,
    pub tod_metered: MeteredBreakdown,
    pub pf_events: Vec<PfEvent>,
    pub fire_timeline: Vec<FireEvent>,
    pub health_cards: Vec<HealthCard>,
    pub savings_items: Vec<SavingsItem>,
    pub location_status: Vec<LocationStatus>,
}

/// Result of one computation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiReport {
    pub kpis: KpiMap,
    pub tables: KpiTables,
    /// Raw row indices rejected by normalization
    pub rejected_rows: Vec<usize>,
}

impl KpiReport {
    /// Shorthand for `self.kpis.get(key)`
    pub fn get(&self, key: &str) -> Option<&KpiValue> {
        self.kpis.get(key)
    }
}
