//! Asset health cards
//!
//! Combines analyzer outputs into four cards. No new computation happens
//! here: only thresholds and labelling. A card whose inputs are entirely
//! absent reports [`HealthStatus::InsufficientData`].

use crate::config::{HealthConfig, PowerQualityConfig};
use crate::demand::DemandStats;
use crate::power_quality::{AlertLevel, FrequencyStats, ImbalanceStats, PfStats, SustainedSummary, VoltageStats};
use serde::Serialize;
use std::fmt;

/// Health status of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Within the good band
    Good,
    /// Outside the good band but not critical
    Warning,
    /// Needs attention
    Critical,
    /// Required fields absent
    #[default]
    InsufficientData,
}

impl HealthStatus {
    /// Check if the status carries a verdict
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::InsufficientData)
    }

    /// Check if the status is good
    pub fn is_good(&self) -> bool {
        matches!(self, Self::Good)
    }

    fn severity(&self) -> u8 {
        match self {
            Self::InsufficientData => 0,
            Self::Good => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four asset cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCard {
    /// PF level and sustained low-PF events
    PowerQuality,
    /// Phase-current balance
    Motor,
    /// Use of contracted demand
    Capacity,
    /// Supply voltage and frequency
    Grid,
}

impl AssetCard {
    pub const ALL: [AssetCard; 4] = [Self::PowerQuality, Self::Motor, Self::Capacity, Self::Grid];

    /// Key used in the KPI mapping
    pub fn key(&self) -> &'static str {
        match self {
            Self::PowerQuality => "health_power_quality",
            Self::Motor => "health_motor",
            Self::Capacity => "health_capacity",
            Self::Grid => "health_grid",
        }
    }
}

/// One health card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCard {
    pub card: AssetCard,
    pub status: HealthStatus,
    /// Headline value
    pub primary: Option<f64>,
    /// Worst observed value
    pub worst: Option<f64>,
    /// Warning events behind the card
    pub warnings: Option<usize>,
    pub message: String,
}

impl HealthCard {
    /// Card with a verdict and its metrics
    pub fn new(card: AssetCard, status: HealthStatus, primary: f64, worst: f64, warnings: usize) -> Self {
        Self {
            card,
            status,
            primary: Some(primary),
            worst: Some(worst),
            warnings: Some(warnings),
            message: status.label().to_string(),
        }
    }

    /// Card whose inputs are absent
    pub fn insufficient(card: AssetCard, reason: impl Into<String>) -> Self {
        Self {
            card,
            status: HealthStatus::InsufficientData,
            primary: None,
            worst: None,
            warnings: None,
            message: reason.into(),
        }
    }

    /// Set the message for this card
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Upstream results available to the cards
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthInputs<'a> {
    pub pf: Option<&'a PfStats>,
    pub sustained: Option<&'a SustainedSummary>,
    pub current_imbalance: Option<&'a ImbalanceStats>,
    pub voltage: Option<&'a VoltageStats>,
    pub frequency: Option<&'a FrequencyStats>,
    pub demand: Option<&'a DemandStats>,
}

/// All cards plus the roll-up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub cards: Vec<HealthCard>,
    /// Worst known card status
    pub overall: HealthStatus,
}

impl HealthReport {
    fn from_cards(cards: Vec<HealthCard>) -> Self {
        let overall = cards
            .iter()
            .map(|c| c.status)
            .max_by_key(HealthStatus::severity)
            .unwrap_or_default();
        Self { cards, overall }
    }

    /// Get the card for a specific asset
    pub fn get(&self, card: AssetCard) -> Option<&HealthCard> {
        self.cards.iter().find(|c| c.card == card)
    }

    /// Count of cards with a given status
    pub fn count(&self, status: HealthStatus) -> usize {
        self.cards.iter().filter(|c| c.status == status).count()
    }
}

/// Health aggregator
#[derive(Debug, Clone, Default)]
pub struct HealthAggregator {
    config: HealthConfig,
    power_quality: PowerQualityConfig,
}

impl HealthAggregator {
    pub fn new(config: &HealthConfig, power_quality: &PowerQualityConfig) -> Self {
        Self {
            config: config.clone(),
            power_quality: power_quality.clone(),
        }
    }

    /// Build every card in fixed order
    pub fn report(&self, inputs: &HealthInputs<'_>) -> HealthReport {
        HealthReport::from_cards(vec![
            self.power_quality_card(inputs),
            self.motor_card(inputs),
            self.capacity_card(inputs),
            self.grid_card(inputs),
        ])
    }

    fn power_quality_card(&self, inputs: &HealthInputs<'_>) -> HealthCard {
        let Some(pf) = inputs.pf else {
            return HealthCard::insufficient(AssetCard::PowerQuality, "no valid power factor readings");
        };
        let alerts = inputs.sustained.map_or(0, SustainedSummary::alerts);
        let level = inputs.sustained.map_or(AlertLevel::Healthy, |s| s.level);

        let status = if pf.avg < self.power_quality.pf_alert || level == AlertLevel::ServiceNeeded {
            HealthStatus::Critical
        } else if pf.avg < self.power_quality.pf_warning || alerts > 0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Good
        };
        HealthCard::new(AssetCard::PowerQuality, status, pf.avg, pf.min, alerts)
            .with_message(format!("avg PF {:.3}, {} sustained alerts ({})", pf.avg, alerts, level))
    }

    fn motor_card(&self, inputs: &HealthInputs<'_>) -> HealthCard {
        let Some(imbalance) = inputs.current_imbalance else {
            return HealthCard::insufficient(AssetCard::Motor, "no phase currents");
        };
        let status = if imbalance.avg_pct >= self.config.current_imbalance_critical_pct {
            HealthStatus::Critical
        } else if imbalance.avg_pct < self.config.current_imbalance_good_pct {
            HealthStatus::Good
        } else {
            HealthStatus::Warning
        };
        HealthCard::new(
            AssetCard::Motor,
            status,
            imbalance.avg_pct,
            imbalance.max_pct,
            imbalance.warnings,
        )
        .with_message(format!("current imbalance avg {:.1}%", imbalance.avg_pct))
    }

    fn capacity_card(&self, inputs: &HealthInputs<'_>) -> HealthCard {
        let Some(demand) = inputs.demand else {
            return HealthCard::insufficient(AssetCard::Capacity, "no power readings");
        };
        let utilization = demand.utilization_pct;
        let status = if utilization > self.config.utilization_critical_pct {
            HealthStatus::Critical
        } else if (self.config.utilization_optimal_low_pct..=self.config.utilization_optimal_high_pct)
            .contains(&utilization)
        {
            HealthStatus::Good
        } else {
            HealthStatus::Warning
        };
        HealthCard::new(
            AssetCard::Capacity,
            status,
            utilization,
            demand.load_max_pct,
            demand.above_contract,
        )
        .with_message(format!(
            "peak {:.1} kW of {:.0} kW contracted",
            demand.peak_kw, demand.contracted_kw
        ))
    }

    fn grid_card(&self, inputs: &HealthInputs<'_>) -> HealthCard {
        let out_of_band = inputs.frequency.map_or(0, |f| f.out_of_band);
        match (inputs.voltage, inputs.frequency) {
            (Some(voltage), _) => {
                let deviation = voltage.deviation_max_pct;
                let status = if deviation >= self.config.voltage_deviation_critical_pct {
                    HealthStatus::Critical
                } else if deviation < self.config.voltage_deviation_good_pct && out_of_band == 0 {
                    HealthStatus::Good
                } else {
                    HealthStatus::Warning
                };
                HealthCard::new(
                    AssetCard::Grid,
                    status,
                    voltage.imbalance.avg_pct,
                    deviation,
                    voltage.imbalance.warnings + out_of_band,
                )
                .with_message(format!(
                    "voltage deviation up to {:.1}%, {} readings off-band",
                    deviation, out_of_band
                ))
            }
            (None, Some(frequency)) => {
                let status = if out_of_band == 0 {
                    HealthStatus::Good
                } else {
                    HealthStatus::Warning
                };
                let centre =
                    (self.power_quality.frequency_low_hz + self.power_quality.frequency_high_hz) / 2.0;
                let worst = (frequency.min_hz - centre)
                    .abs()
                    .max((frequency.max_hz - centre).abs());
                HealthCard {
                    card: AssetCard::Grid,
                    status,
                    primary: None,
                    worst: Some(worst),
                    warnings: Some(out_of_band),
                    message: format!("frequency {:.2}-{:.2} Hz", frequency.min_hz, frequency.max_hz),
                }
            }
            (None, None) => HealthCard::insufficient(AssetCard::Grid, "no line voltages or frequency"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pf(avg: f64) -> PfStats {
        PfStats {
            valid_readings: 10,
            avg,
            min: avg - 0.05,
            below_warning_pct: 0.0,
            below_alert_pct: 0.0,
        }
    }

    fn imbalance(avg_pct: f64) -> ImbalanceStats {
        ImbalanceStats {
            readings: 10,
            max_pct: avg_pct * 2.0,
            avg_pct,
            warnings: 3,
        }
    }

    fn demand(utilization_pct: f64) -> DemandStats {
        DemandStats {
            readings: 10,
            contracted_kw: 200.0,
            peak_kw: utilization_pct * 2.0,
            avg_kw: utilization_pct,
            load_factor_pct: Some(50.0),
            utilization_pct,
            load_avg_pct: utilization_pct / 2.0,
            load_max_pct: utilization_pct,
            idle_time_pct: 0.0,
            above_contract: 0,
        }
    }

    #[test]
    fn test_health_status_default() {
        assert_eq!(HealthStatus::default(), HealthStatus::InsufficientData);
        assert!(!HealthStatus::InsufficientData.is_known());
        assert!(HealthStatus::Good.is_good());
    }

    #[test]
    fn test_empty_inputs_are_insufficient() {
        let report = HealthAggregator::default().report(&HealthInputs::default());
        assert_eq!(report.cards.len(), 4);
        assert_eq!(report.count(HealthStatus::InsufficientData), 4);
        assert_eq!(report.overall, HealthStatus::InsufficientData);
        assert_eq!(report.cards[0].primary, None);
    }

    #[test]
    fn test_power_quality_card() {
        let agg = HealthAggregator::default();
        let good = pf(0.96);
        let report = agg.report(&HealthInputs {
            pf: Some(&good),
            ..Default::default()
        });
        let card = report.get(AssetCard::PowerQuality).unwrap();
        assert_eq!(card.status, HealthStatus::Good);
        assert_eq!(card.warnings, Some(0));

        let low = pf(0.85);
        let report = agg.report(&HealthInputs {
            pf: Some(&low),
            ..Default::default()
        });
        assert_eq!(report.get(AssetCard::PowerQuality).unwrap().status, HealthStatus::Critical);
    }

    #[test]
    fn test_motor_card_bands() {
        let agg = HealthAggregator::default();
        for (avg, expected) in [
            (5.0, HealthStatus::Good),
            (15.0, HealthStatus::Warning),
            (25.0, HealthStatus::Critical),
        ] {
            let stats = imbalance(avg);
            let report = agg.report(&HealthInputs {
                current_imbalance: Some(&stats),
                ..Default::default()
            });
            assert_eq!(report.get(AssetCard::Motor).unwrap().status, expected);
        }
    }

    #[test]
    fn test_capacity_optimal_band() {
        let agg = HealthAggregator::default();
        for (utilization, expected) in [
            (30.0, HealthStatus::Warning),
            (60.0, HealthStatus::Good),
            (80.0, HealthStatus::Good),
            (95.0, HealthStatus::Warning),
            (120.0, HealthStatus::Critical),
        ] {
            let stats = demand(utilization);
            let report = agg.report(&HealthInputs {
                demand: Some(&stats),
                ..Default::default()
            });
            assert_eq!(report.get(AssetCard::Capacity).unwrap().status, expected);
        }
    }

    #[test]
    fn test_grid_card_frequency_only() {
        let frequency = FrequencyStats {
            readings: 5,
            min_hz: 49.3,
            max_hz: 50.1,
            out_of_band: 1,
        };
        let report = HealthAggregator::default().report(&HealthInputs {
            frequency: Some(&frequency),
            ..Default::default()
        });
        let card = report.get(AssetCard::Grid).unwrap();
        assert_eq!(card.status, HealthStatus::Warning);
        assert_eq!(card.warnings, Some(1));
    }

    #[test]
    fn test_overall_is_worst_known() {
        let good = pf(0.97);
        let bad = imbalance(30.0);
        let report = HealthAggregator::default().report(&HealthInputs {
            pf: Some(&good),
            current_imbalance: Some(&bad),
            ..Default::default()
        });
        assert_eq!(report.overall, HealthStatus::Critical);
        assert_eq!(report.count(HealthStatus::InsufficientData), 2);
    }
}
