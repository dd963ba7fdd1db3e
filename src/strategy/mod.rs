//! Arbitrage strategies: candidate records, generation, validation and
//! selection.

pub mod generator;
pub mod selector;
pub mod validator;

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::sim::soc::SocBounds;
use crate::sim::types::interval_energy_kwh;

pub use generator::{Allocation, BalanceRule, SegmentView, StrategyProfile, generate};
pub use selector::{CycleBudget, RejectReason, Rejection, Selection, select};
pub use validator::{Validated, repair_steps, validate};

/// The three arbitrage heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StrategyKind {
    Balanced,
    Aggressive,
    DischargeCharge,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [Self::Balanced, Self::Aggressive, Self::DischargeCharge];

    /// Configuration name, as used in `[strategies] enabled`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
            Self::DischargeCharge => "discharge_charge",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balanced => write!(f, "Balanced"),
            Self::Aggressive => write!(f, "Aggressive"),
            Self::DischargeCharge => write!(f, "DischargeCharge"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                format!("unknown strategy '{s}'. Available: {}", known.join(", "))
            })
    }
}

/// One interval of a candidate. `soc_kwh` is the SoC after the action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStep {
    #[serde(skip)]
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub action_kw: f64,
    pub soc_kwh: f64,
    pub price_ct_per_kwh: f64,
}

/// A proposed action sequence for one segment.
///
/// Field names in the serialized form follow the established export format
/// consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyCandidate {
    #[serde(rename = "strategie_id")]
    pub id: usize,
    #[serde(rename = "zeitraum_id")]
    pub segment_id: usize,
    #[serde(rename = "strategie_typ")]
    pub kind: StrategyKind,
    #[serde(rename = "start_index")]
    pub start: usize,
    /// Exclusive.
    #[serde(rename = "end_index")]
    pub end: usize,
    /// SoC entering the segment (kWh).
    #[serde(rename = "basis_soc")]
    pub entry_soc_kwh: f64,
    #[serde(rename = "max_soc_erreicht")]
    pub max_soc_kwh: f64,
    #[serde(rename = "min_soc_erreicht")]
    pub min_soc_kwh: f64,
    #[serde(rename = "gesamte_lademenge")]
    pub charged_kwh: f64,
    #[serde(rename = "gesamte_entlademenge")]
    pub discharged_kwh: f64,
    pub profit_euro: f64,
    #[serde(rename = "strategie_details")]
    pub steps: Vec<StrategyStep>,
    /// Balance rule the trade was generated under; re-applied on validation.
    #[serde(skip)]
    pub balance: BalanceRule,
}

impl StrategyCandidate {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn overlaps(&self, other: &StrategyCandidate) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Recomputes energy totals, profit and the reported SoC extremes from
    /// the current steps. Extremes are clamped to `bounds`.
    pub fn refresh_totals(&mut self, bounds: &SocBounds) {
        self.charged_kwh = charged_kwh(&self.steps);
        self.discharged_kwh = discharged_kwh(&self.steps);
        self.profit_euro = profit_euro(&self.steps);

        let (lo, hi) = self
            .steps
            .iter()
            .map(|s| s.soc_kwh)
            .fold((self.entry_soc_kwh, self.entry_soc_kwh), |(lo, hi), s| {
                (lo.min(s), hi.max(s))
            });
        self.min_soc_kwh = bounds.clamp(lo);
        self.max_soc_kwh = bounds.clamp(hi);
    }
}

impl fmt::Display for StrategyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:>3} seg={:>3} {:<16} [{:>5}..{:>5}) in={:>8.1} chg={:>8.1} dis={:>8.1} \
             soc=[{:>7.1}, {:>7.1}] profit={:>9.2} EUR",
            self.id,
            self.segment_id,
            self.kind.to_string(),
            self.start,
            self.end,
            self.entry_soc_kwh,
            self.charged_kwh,
            self.discharged_kwh,
            self.min_soc_kwh,
            self.max_soc_kwh,
            self.profit_euro,
        )
    }
}

impl fmt::Display for StrategyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} act={:>8.1} kW soc={:>8.1} kWh price={:>6.2} ct",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.action_kw,
            self.soc_kwh,
            self.price_ct_per_kwh,
        )
    }
}

/// Arbitrage profit of a step sequence (€).
///
/// Discharging earns and charging costs the local price; kW are converted to
/// kWh per interval and ct to €.
pub fn profit_euro(steps: &[StrategyStep]) -> f64 {
    steps
        .iter()
        .map(|s| -interval_energy_kwh(s.action_kw) * s.price_ct_per_kwh / 100.0)
        .sum()
}

pub fn charged_kwh(steps: &[StrategyStep]) -> f64 {
    steps
        .iter()
        .filter(|s| s.action_kw > 0.0)
        .map(|s| interval_energy_kwh(s.action_kw))
        .sum()
}

pub fn discharged_kwh(steps: &[StrategyStep]) -> f64 {
    steps
        .iter()
        .filter(|s| s.action_kw < 0.0)
        .map(|s| interval_energy_kwh(-s.action_kw))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn step(action_kw: f64, price: f64) -> StrategyStep {
        StrategyStep {
            index: 0,
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid date"),
            action_kw,
            soc_kwh: 0.0,
            price_ct_per_kwh: price,
        }
    }

    #[test]
    fn profit_signs() {
        // charge 400 kW at 10 ct = 100 kWh * 0.10 = -10 €
        assert!((profit_euro(&[step(400.0, 10.0)]) + 10.0).abs() < 1e-9);
        // discharge 400 kW at 50 ct = +50 €
        assert!((profit_euro(&[step(-400.0, 50.0)]) - 50.0).abs() < 1e-9);
        assert_eq!(profit_euro(&[step(0.0, 99.0)]), 0.0);
    }

    #[test]
    fn energy_totals() {
        let steps = [step(400.0, 0.0), step(-200.0, 0.0), step(-200.0, 0.0)];
        assert_eq!(charged_kwh(&steps), 100.0);
        assert_eq!(discharged_kwh(&steps), 100.0);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>(), Ok(kind));
        }
        assert!("greedy".parse::<StrategyKind>().is_err());
    }
}
