//! Independent re-simulation of candidate trajectories.

use tracing::debug;

use super::generator::{BalanceRule, trim_from_end};
use super::{StrategyCandidate, StrategyStep, charged_kwh, discharged_kwh};
use crate::sim::band::BandPoint;
use crate::sim::soc::SocBounds;
use crate::sim::types::interval_energy_kwh;

/// Smallest action change counted as a repair (kW).
const REPAIR_EPSILON_KW: f64 = 1e-9;

/// Profit at or below this is treated as no profit (€).
const MIN_PROFIT_EURO: f64 = 1e-6;

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    /// Feasible and profitable, possibly after reducing some actions.
    Feasible {
        candidate: StrategyCandidate,
        repaired_steps: usize,
    },
    /// No positive profit left after repair, or legs that no longer balance.
    Unprofitable(StrategyCandidate),
}

/// Replays `steps` from `entry_soc_kwh`, reducing any action that exceeds the
/// band potentials or would leave the SoC bounds.
///
/// Each step's `soc_kwh` is rewritten as the SoC after its (possibly reduced)
/// action, so later steps always see the repaired history. `band` must be
/// aligned with `steps`.
///
/// # Returns
///
/// The number of steps whose action was changed.
pub fn repair_steps(
    steps: &mut [StrategyStep],
    entry_soc_kwh: f64,
    band: &[BandPoint],
    bounds: &SocBounds,
) -> usize {
    let mut soc = entry_soc_kwh;
    let mut repaired = 0;

    for (step, point) in steps.iter_mut().zip(band) {
        let requested = step.action_kw;
        let mut action = if requested > 0.0 {
            requested.min(point.charge_potential_kw)
        } else {
            requested.max(-point.discharge_potential_kw)
        };
        action = bounds.limit_action(soc, action);

        if (action - requested).abs() > REPAIR_EPSILON_KW {
            repaired += 1;
        }
        soc += interval_energy_kwh(action);
        step.action_kw = action;
        step.soc_kwh = soc;
    }
    repaired
}

/// Validates a candidate against the SoC actually entering its segment.
///
/// The steps are repaired in place, the candidate's balance rule is applied
/// again to whatever the repair left, and the totals are refreshed. The
/// candidate is kept only if its legs still satisfy the rule and its profit
/// stays positive beyond rounding noise.
pub fn validate(
    mut candidate: StrategyCandidate,
    entry_soc_kwh: f64,
    band: &[BandPoint],
    bounds: &SocBounds,
) -> Validated {
    let requested: Vec<f64> = candidate.steps.iter().map(|s| s.action_kw).collect();
    candidate.entry_soc_kwh = entry_soc_kwh;

    repair_steps(&mut candidate.steps, entry_soc_kwh, band, bounds);
    if rebalance(&mut candidate.steps, candidate.balance) {
        // trimming one leg shifts the SoC seen by every later step
        repair_steps(&mut candidate.steps, entry_soc_kwh, band, bounds);
    }
    candidate.refresh_totals(bounds);

    let repaired_steps = requested
        .iter()
        .zip(&candidate.steps)
        .filter(|(r, s)| (*r - s.action_kw).abs() > REPAIR_EPSILON_KW)
        .count();
    if repaired_steps > 0 {
        debug!(
            kind = %candidate.kind,
            segment = candidate.segment_id,
            repaired_steps,
            profit_euro = candidate.profit_euro,
            "candidate repaired"
        );
    }

    let balanced = candidate
        .balance
        .excess_kwh(candidate.charged_kwh, candidate.discharged_kwh)
        == 0.0;
    if balanced && candidate.profit_euro > MIN_PROFIT_EURO {
        Validated::Feasible {
            candidate,
            repaired_steps,
        }
    } else {
        Validated::Unprofitable(candidate)
    }
}

/// Trims the larger leg of `steps` until it satisfies `balance`.
///
/// Only actions are changed; the caller re-simulates the SoC.
fn rebalance(steps: &mut [StrategyStep], balance: BalanceRule) -> bool {
    let excess = balance.excess_kwh(charged_kwh(steps), discharged_kwh(steps));
    if excess == 0.0 {
        return false;
    }
    let mut actions: Vec<f64> = steps.iter().map(|s| s.action_kw).collect();
    trim_from_end(&mut actions, excess);
    for (step, action) in steps.iter_mut().zip(actions) {
        step.action_kw = action;
    }
    true
}
