//! Greedy profit-ranked selection under non-overlap and the annual cycle
//! budget.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument};

use super::StrategyCandidate;
use crate::sim::types::BatteryParams;

/// Why a candidate was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No positive profit left after validation.
    Unprofitable,
    /// Shares intervals with a more profitable accepted candidate.
    Overlap,
    /// The annual charged-energy budget was exhausted.
    CycleLimit,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprofitable => write!(f, "unprofitable"),
            Self::Overlap => write!(f, "overlap"),
            Self::CycleLimit => write!(f, "cycle limit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub candidate: StrategyCandidate,
    pub reason: RejectReason,
}

/// Cumulative charged energy against the annual limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleBudget {
    pub limit_kwh: f64,
    pub used_kwh: f64,
}

impl CycleBudget {
    /// Full budget `capacity × daily_cycles × 365`, nothing used yet.
    pub fn annual(battery: &BatteryParams) -> Self {
        Self {
            limit_kwh: battery.annual_charge_budget_kwh(),
            used_kwh: 0.0,
        }
    }

    /// Pre-charges the budget with energy the baseline already charges.
    pub fn with_usage(mut self, used_kwh: f64) -> Self {
        self.used_kwh += used_kwh;
        self
    }

    pub fn remaining_kwh(&self) -> f64 {
        (self.limit_kwh - self.used_kwh).max(0.0)
    }

    /// Books `kwh` if it fits; leaves the budget untouched otherwise.
    pub fn try_reserve(&mut self, kwh: f64) -> bool {
        if self.used_kwh + kwh > self.limit_kwh {
            return false;
        }
        self.used_kwh += kwh;
        true
    }
}

/// Result of selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Accepted candidates in acceptance (profit-descending) order.
    pub accepted: Vec<StrategyCandidate>,
    pub rejected: Vec<Rejection>,
    pub budget: CycleBudget,
}

/// Ranks candidates by profit (ties by candidate id) and accepts greedily.
///
/// A candidate overlapping an accepted one is skipped with
/// [`RejectReason::Overlap`]. The first candidate whose charged energy does
/// not fit the remaining budget ends the scan: it and every remaining
/// candidate are rejected with [`RejectReason::CycleLimit`].
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn select(mut candidates: Vec<StrategyCandidate>, mut budget: CycleBudget) -> Selection {
    candidates.sort_by(|a, b| {
        b.profit_euro
            .total_cmp(&a.profit_euro)
            .then_with(|| a.id.cmp(&b.id))
    });

    let horizon_end = candidates.iter().map(|c| c.end).max().unwrap_or(0);
    let mut occupied = vec![false; horizon_end];
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut exhausted = false;

    for candidate in candidates {
        if exhausted {
            rejected.push(Rejection {
                candidate,
                reason: RejectReason::CycleLimit,
            });
            continue;
        }
        if occupied[candidate.range()].iter().any(|&o| o) {
            rejected.push(Rejection {
                candidate,
                reason: RejectReason::Overlap,
            });
            continue;
        }
        if !budget.try_reserve(candidate.charged_kwh) {
            exhausted = true;
            rejected.push(Rejection {
                candidate,
                reason: RejectReason::CycleLimit,
            });
            continue;
        }
        occupied[candidate.range()].fill(true);
        accepted.push(candidate);
    }

    info!(
        accepted = accepted.len(),
        rejected = rejected.len(),
        budget_used_kwh = budget.used_kwh,
        budget_limit_kwh = budget.limit_kwh,
        "strategies selected"
    );

    Selection {
        accepted,
        rejected,
        budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{BalanceRule, StrategyKind};

    fn cand(id: usize, start: usize, end: usize, profit: f64, charged: f64) -> StrategyCandidate {
        StrategyCandidate {
            id,
            segment_id: id,
            kind: StrategyKind::Balanced,
            start,
            end,
            entry_soc_kwh: 300.0,
            max_soc_kwh: 300.0,
            min_soc_kwh: 300.0,
            charged_kwh: charged,
            discharged_kwh: charged,
            profit_euro: profit,
            steps: Vec::new(),
            balance: BalanceRule::Equal { tolerance_kwh: 1.0 },
        }
    }

    fn budget(limit: f64) -> CycleBudget {
        CycleBudget {
            limit_kwh: limit,
            used_kwh: 0.0,
        }
    }

    #[test]
    fn highest_profit_wins_overlap() {
        let sel = select(
            vec![cand(1, 0, 8, 10.0, 100.0), cand(2, 0, 8, 20.0, 100.0)],
            budget(1e9),
        );
        assert_eq!(sel.accepted.len(), 1);
        assert_eq!(sel.accepted[0].id, 2);
        assert_eq!(sel.rejected[0].reason, RejectReason::Overlap);
    }

    #[test]
    fn disjoint_candidates_all_accepted() {
        let sel = select(
            vec![cand(1, 0, 8, 10.0, 100.0), cand(2, 8, 16, 5.0, 100.0)],
            budget(1e9),
        );
        assert_eq!(sel.accepted.len(), 2);
        assert!(sel.rejected.is_empty());
        assert_eq!(sel.budget.used_kwh, 200.0);
    }

    #[test]
    fn equal_profit_breaks_tie_by_id() {
        let sel = select(
            vec![cand(7, 0, 8, 10.0, 1.0), cand(3, 0, 8, 10.0, 1.0)],
            budget(1e9),
        );
        assert_eq!(sel.accepted[0].id, 3);
    }

    #[test]
    fn cycle_limit_stops_scan() {
        let sel = select(
            vec![
                cand(1, 0, 8, 30.0, 150.0),
                cand(2, 8, 16, 20.0, 100.0),
                cand(3, 16, 24, 10.0, 10.0),
            ],
            budget(200.0),
        );
        assert_eq!(sel.accepted.len(), 1);
        assert_eq!(sel.rejected.len(), 2);
        // the small third candidate would fit but the scan has stopped
        assert!(
            sel.rejected
                .iter()
                .all(|r| r.reason == RejectReason::CycleLimit)
        );
        assert!(sel.budget.used_kwh <= sel.budget.limit_kwh);
    }

    #[test]
    fn baseline_usage_shrinks_budget() {
        let b = budget(100.0).with_usage(60.0);
        assert_eq!(b.remaining_kwh(), 40.0);
        let sel = select(vec![cand(1, 0, 8, 5.0, 50.0)], b);
        assert!(sel.accepted.is_empty());
        assert_eq!(sel.rejected[0].reason, RejectReason::CycleLimit);
    }
}
