//! Candidate generation: one parameterized rank → allocate → balance
//! algorithm, configured per strategy kind by a [`StrategyProfile`].

use tracing::trace;

use super::{StrategyCandidate, StrategyKind, StrategyStep};
use crate::sim::band::{BandPoint, FlexibilityBand};
use crate::sim::segment::Segment;
use crate::sim::soc::SocBounds;
use crate::sim::types::{Horizon, Interval, STEPS_PER_HOUR, interval_energy_kwh};

/// Energy below which a charge or discharge leg counts as absent (kWh).
const MIN_LEG_KWH: f64 = 1e-6;

/// Charged energy a discharge-led trade may exceed its discharge by (kWh).
const DISCHARGE_LED_SLACK_KWH: f64 = 1e-6;

/// How steps are assigned to charging and discharging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// Cheapest half charges, priciest half discharges.
    PriceHalves,
    /// The `min(len / 2, cap)` cheapest steps charge and as many of the
    /// priciest discharge; the rest stay idle.
    PhaseBudget(usize),
    /// The first half discharges on its priciest steps, the second half
    /// charges on its cheapest; at most `cap` steps each.
    DischargeThenCharge(usize),
}

/// End-of-segment energy balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceRule {
    /// Charged and discharged energy must agree within `tolerance_kwh`; the
    /// larger side is trimmed from its last action backwards.
    Equal { tolerance_kwh: f64 },
    /// Charged energy may never exceed discharged energy.
    DischargeLed,
}

impl BalanceRule {
    /// Energy to remove so that `charged_kwh` and `discharged_kwh` satisfy
    /// the rule. Positive trims charging, negative trims discharging, zero
    /// means the legs already comply.
    pub fn excess_kwh(self, charged_kwh: f64, discharged_kwh: f64) -> f64 {
        let excess = charged_kwh - discharged_kwh;
        match self {
            Self::Equal { tolerance_kwh } if excess.abs() > tolerance_kwh => excess,
            Self::DischargeLed if excess > DISCHARGE_LED_SLACK_KWH => excess,
            _ => 0.0,
        }
    }
}

/// Per-kind parameters of the generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyProfile {
    pub kind: StrategyKind,
    /// Fraction of the available potential actually used.
    pub potential_ratio: f64,
    /// Segments shorter than this are declined.
    pub min_steps: usize,
    pub allocation: Allocation,
    pub balance: BalanceRule,
}

impl StrategyProfile {
    pub fn for_kind(kind: StrategyKind, balance_tolerance_kwh: f64) -> Self {
        let equal = BalanceRule::Equal {
            tolerance_kwh: balance_tolerance_kwh,
        };
        match kind {
            StrategyKind::Balanced => Self {
                kind,
                potential_ratio: 0.8,
                min_steps: 4,
                allocation: Allocation::PriceHalves,
                balance: equal,
            },
            StrategyKind::Aggressive => Self {
                kind,
                potential_ratio: 0.95,
                min_steps: 6,
                allocation: Allocation::PhaseBudget(10),
                balance: equal,
            },
            StrategyKind::DischargeCharge => Self {
                kind,
                potential_ratio: 0.7,
                min_steps: 4,
                allocation: Allocation::DischargeThenCharge(4),
                balance: BalanceRule::DischargeLed,
            },
        }
    }
}

/// Read-only slices of the run that one segment's generation needs.
///
/// The baseline moves no energy inside a segment, so a strategy's actions
/// stand in for it rather than adding to it.
#[derive(Debug, Clone, Copy)]
pub struct SegmentView<'a> {
    pub segment: &'a Segment,
    pub intervals: &'a [Interval],
    pub band: &'a [BandPoint],
    /// True SoC entering the segment (kWh).
    pub entry_soc_kwh: f64,
    pub bounds: SocBounds,
}

impl<'a> SegmentView<'a> {
    pub fn new(
        segment: &'a Segment,
        horizon: &'a Horizon,
        band: &'a FlexibilityBand,
        bounds: SocBounds,
    ) -> Self {
        Self {
            segment,
            intervals: &horizon.intervals()[segment.range()],
            band: &band.points()[segment.range()],
            entry_soc_kwh: band.soc_before(segment.start),
            bounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Idle,
    Charge,
    Discharge,
}

/// Produces one candidate for the segment, or `None` when the segment is too
/// short or no trade with both a charge and a discharge leg is possible.
pub fn generate(profile: &StrategyProfile, view: &SegmentView<'_>) -> Option<StrategyCandidate> {
    let n = view.intervals.len();
    if n < profile.min_steps {
        trace!(kind = %profile.kind, segment = view.segment.id, "segment too short");
        return None;
    }

    let prices: Vec<f64> = view.intervals.iter().map(|iv| iv.price_ct_per_kwh).collect();
    let roles = assign_roles(profile.allocation, &prices);
    let bounds = view.bounds;

    let mut soc = view.entry_soc_kwh;
    let mut charged = 0.0;
    let mut discharged = 0.0;
    let mut actions = vec![0.0; n];

    for (k, role) in roles.iter().enumerate() {
        let point = &view.band[k];
        let baseline_kwh = interval_energy_kwh(view.intervals[k].baseline_action_kw);
        let action = match role {
            Role::Idle => 0.0,
            Role::Charge => {
                let headroom = ((bounds.max_kwh - soc - baseline_kwh) * STEPS_PER_HOUR).max(0.0);
                let mut a = profile.potential_ratio * point.charge_potential_kw.min(headroom);
                if profile.balance == BalanceRule::DischargeLed {
                    a = a.min(((discharged - charged) * STEPS_PER_HOUR).max(0.0));
                }
                a
            }
            Role::Discharge => {
                let headroom = ((soc - bounds.min_kwh + baseline_kwh) * STEPS_PER_HOUR).max(0.0);
                -profile.potential_ratio * point.discharge_potential_kw.min(headroom)
            }
        };
        if action > 0.0 {
            charged += interval_energy_kwh(action);
        } else {
            discharged += interval_energy_kwh(-action);
        }
        soc += interval_energy_kwh(action);
        actions[k] = action;
    }

    if charged < MIN_LEG_KWH || discharged < MIN_LEG_KWH {
        trace!(
            kind = %profile.kind,
            segment = view.segment.id,
            charged,
            discharged,
            "no two-sided trade possible"
        );
        return None;
    }

    let excess = profile.balance.excess_kwh(charged, discharged);
    if excess != 0.0 {
        trim_from_end(&mut actions, excess);
    }

    let mut soc = view.entry_soc_kwh;
    let steps = view
        .intervals
        .iter()
        .zip(&actions)
        .map(|(iv, &action_kw)| {
            soc += interval_energy_kwh(action_kw);
            StrategyStep {
                index: iv.index,
                timestamp: iv.timestamp,
                action_kw,
                soc_kwh: soc,
                price_ct_per_kwh: iv.price_ct_per_kwh,
            }
        })
        .collect();

    let mut candidate = StrategyCandidate {
        id: 0,
        segment_id: view.segment.id,
        kind: profile.kind,
        start: view.segment.start,
        end: view.segment.end,
        entry_soc_kwh: view.entry_soc_kwh,
        max_soc_kwh: view.entry_soc_kwh,
        min_soc_kwh: view.entry_soc_kwh,
        charged_kwh: 0.0,
        discharged_kwh: 0.0,
        profit_euro: 0.0,
        steps,
        balance: profile.balance,
    };
    candidate.refresh_totals(&bounds);
    Some(candidate)
}

fn assign_roles(allocation: Allocation, prices: &[f64]) -> Vec<Role> {
    let n = prices.len();
    let mut roles = vec![Role::Idle; n];
    let mut mark = |indices: &[usize], role: Role| {
        for &i in indices {
            roles[i] = role;
        }
    };

    match allocation {
        Allocation::PriceHalves | Allocation::PhaseBudget(_) => {
            let k = match allocation {
                Allocation::PhaseBudget(cap) => (n / 2).min(cap),
                _ => n / 2,
            };
            let ranked = rank_ascending(prices, 0..n);
            mark(&ranked[..k], Role::Charge);
            mark(&ranked[n - k..], Role::Discharge);
        }
        Allocation::DischargeThenCharge(cap) => {
            let mid = n / 2;
            let first = rank_ascending(prices, 0..mid);
            let second = rank_ascending(prices, mid..n);
            let k_discharge = (mid / 2).min(cap);
            let k_charge = ((n - mid) / 2).min(cap);
            mark(&first[mid - k_discharge..], Role::Discharge);
            mark(&second[..k_charge], Role::Charge);
        }
    }
    roles
}

/// Indices in `range` ordered by price ascending; equal prices keep
/// interval order.
fn rank_ascending(prices: &[f64], range: std::ops::Range<usize>) -> Vec<usize> {
    let mut idx: Vec<usize> = range.collect();
    idx.sort_by(|&a, &b| prices[a].total_cmp(&prices[b]));
    idx
}

/// Removes `excess_kwh` from the larger side, starting at its last action.
/// A positive excess trims charging, a negative one trims discharging.
pub(super) fn trim_from_end(actions: &mut [f64], excess_kwh: f64) {
    let trim_charge = excess_kwh > 0.0;
    let mut remaining_kw = excess_kwh.abs() * STEPS_PER_HOUR;

    for a in actions.iter_mut().rev() {
        if remaining_kw <= 0.0 {
            break;
        }
        let on_side = if trim_charge { *a > 0.0 } else { *a < 0.0 };
        if !on_side {
            continue;
        }
        let cut = a.abs().min(remaining_kw);
        *a -= cut.copysign(*a);
        remaining_kw -= cut;
    }
}
