//! Merges accepted strategies into the baseline and recomputes the final
//! SoC trajectory end to end.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::band::{BaselineCorrection, FlexibilityBand};
use super::soc::{Bound, SocBounds};
use super::types::{BatteryParams, Horizon, interval_energy_kwh};
use crate::strategy::{RejectReason, Rejection, StrategyCandidate, Validated, validate};

/// An interval where the canonical recursion had to clamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Violation {
    pub index: usize,
    /// SoC before clamping (kWh).
    pub soc_kwh: f64,
    pub bound: Bound,
}

/// Final per-interval actions and SoC for the whole horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImplementedSchedule {
    pub actions_kw: Vec<f64>,
    /// SoC at the start of each interval (kWh).
    pub soc_kwh: Vec<f64>,
    /// SoC after the last interval (kWh).
    pub final_soc_kwh: f64,
    pub violations: Vec<Violation>,
}

impl ImplementedSchedule {
    pub fn len(&self) -> usize {
        self.actions_kw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions_kw.is_empty()
    }

    /// SoC after interval `index`.
    pub fn soc_after(&self, index: usize) -> f64 {
        self.soc_kwh
            .get(index + 1)
            .copied()
            .unwrap_or(self.final_soc_kwh)
    }
}

/// Output of [`implement`].
#[derive(Debug, Clone, PartialEq)]
pub struct Implementation {
    pub schedule: ImplementedSchedule,
    /// Accepted strategies in chronological order, re-validated against the
    /// SoC that actually enters their segment.
    pub strategies: Vec<StrategyCandidate>,
    /// Baseline actions reduced outside accepted segments.
    pub corrections: Vec<BaselineCorrection>,
    /// Number of strategies changed by re-validation.
    pub repaired: usize,
    /// Strategies that no longer pay at their entering SoC; the baseline runs
    /// in their place.
    pub rejected: Vec<Rejection>,
}

/// Canonical recursion `soc[t] = clamp(soc[t-1] + action[t-1] / 4)` from
/// `start_soc_kwh`.
///
/// # Returns
///
/// The start-of-interval SoC series, the SoC after the last action, and one
/// [`Violation`] for every point where the clamp actually changed the value.
pub fn replay(
    start_soc_kwh: f64,
    actions_kw: &[f64],
    bounds: &SocBounds,
) -> (Vec<f64>, f64, Vec<Violation>) {
    let mut soc = start_soc_kwh;
    let mut series = Vec::with_capacity(actions_kw.len());
    let mut violations = Vec::new();

    for (t, &action) in actions_kw.iter().enumerate() {
        series.push(soc);
        let next = soc + interval_energy_kwh(action);
        if let Some(bound) = bounds.breach(next) {
            violations.push(Violation {
                index: t + 1,
                soc_kwh: next,
                bound,
            });
        }
        soc = bounds.clamp(next);
    }
    (series, soc, violations)
}

/// Builds the implemented schedule.
///
/// Walks the horizon in time order. Each accepted strategy is validated again
/// against the real entering SoC; if it survives, its actions are used for
/// its segment. A strategy left without profit, or with legs that no longer
/// balance, is rejected and the baseline runs instead. Baseline actions are
/// reduced to the largest legal magnitude when they would leave the bounds.
#[instrument(skip_all, fields(intervals = horizon.len(), strategies = accepted.len()))]
pub fn implement(
    horizon: &Horizon,
    battery: &BatteryParams,
    band: &FlexibilityBand,
    accepted: Vec<StrategyCandidate>,
) -> Implementation {
    let bounds = battery.bounds();
    let strategies = chronological(accepted);

    let mut actions = Vec::with_capacity(horizon.len());
    let mut corrections = Vec::new();
    let mut applied = Vec::with_capacity(strategies.len());
    let mut rejected = Vec::new();
    let mut repaired = 0;
    let mut soc = battery.start_soc_kwh();
    let mut pending = strategies.into_iter().peekable();

    let mut t = 0;
    while t < horizon.len() {
        if let Some(strategy) = pending.next_if(|c| c.start == t) {
            let range = strategy.range();
            match validate(strategy, soc, &band.points()[range], &bounds) {
                Validated::Feasible {
                    candidate,
                    repaired_steps,
                } => {
                    if repaired_steps > 0 {
                        repaired += 1;
                        debug!(
                            id = candidate.id,
                            start = candidate.start,
                            repaired_steps,
                            profit_euro = candidate.profit_euro,
                            "strategy re-validated against entering SoC"
                        );
                    }
                    for step in &candidate.steps {
                        actions.push(step.action_kw);
                        soc += interval_energy_kwh(step.action_kw);
                    }
                    t = candidate.end;
                    applied.push(candidate);
                }
                Validated::Unprofitable(candidate) => {
                    warn!(
                        id = candidate.id,
                        start = candidate.start,
                        entry_soc_kwh = soc,
                        profit_euro = candidate.profit_euro,
                        "strategy no longer pays at its entering SoC; baseline kept"
                    );
                    rejected.push(Rejection {
                        candidate,
                        reason: RejectReason::Unprofitable,
                    });
                }
            }
            continue;
        }

        let requested = horizon.intervals()[t].baseline_action_kw;
        let mut action = requested;
        if let Some(bound) = bounds.breach(soc + interval_energy_kwh(requested)) {
            action = bounds.limit_action(soc, requested);
            corrections.push(BaselineCorrection {
                index: t,
                requested_kw: requested,
                corrected_kw: action,
                bound,
            });
        }
        actions.push(action);
        soc += interval_energy_kwh(action);
        t += 1;
    }

    let (soc_kwh, final_soc_kwh, violations) = replay(battery.start_soc_kwh(), &actions, &bounds);

    if !corrections.is_empty() {
        warn!(count = corrections.len(), "baseline actions reduced to stay in bounds");
    }
    for v in &violations {
        warn!(index = v.index, soc_kwh = v.soc_kwh, bound = %v.bound, "residual SoC violation");
    }
    info!(
        strategies = applied.len(),
        repaired,
        rejected = rejected.len(),
        violations = violations.len(),
        "schedule implemented"
    );

    Implementation {
        schedule: ImplementedSchedule {
            actions_kw: actions,
            soc_kwh,
            final_soc_kwh,
            violations,
        },
        strategies: applied,
        corrections,
        repaired,
        rejected,
    }
}

/// Sorts by start and drops any strategy overlapping an earlier one.
fn chronological(mut strategies: Vec<StrategyCandidate>) -> Vec<StrategyCandidate> {
    strategies.sort_by_key(|c| c.start);
    let mut last_end = 0;
    strategies.retain(|c| {
        if c.start < last_end || c.len() != c.end - c.start {
            warn!(id = c.id, start = c.start, "overlapping or malformed strategy skipped");
            return false;
        }
        last_end = c.end;
        true
    });
    strategies
}
