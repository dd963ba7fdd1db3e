//! Hand-built scenarios with known answers.

mod common;

use approx::assert_abs_diff_eq;

use bess_arbitrage::sim::band::{BandOptions, FlexibilityBand};
use bess_arbitrage::sim::engine::{Engine, PipelineConfig};
use bess_arbitrage::sim::segment::{Segment, SegmentRules, find_segments};
use bess_arbitrage::sim::soc::Bound;
use bess_arbitrage::sim::types::{Horizon, SOC_EPSILON};
use bess_arbitrage::strategy::{
    RejectReason, SegmentView, StrategyKind, StrategyProfile, generate,
};

#[test]
fn balanced_trades_the_flat_spread() {
    let battery = common::default_battery();
    let horizon = common::spread_horizon();
    let band = FlexibilityBand::compute(&horizon, &battery, BandOptions::default());
    let segments = find_segments(band.soc_before(0), band.points(), &SegmentRules::default());
    assert_eq!(segments, vec![Segment { id: 1, start: 0, end: 8 }]);

    let view = SegmentView::new(&segments[0], &horizon, &band, battery.bounds());
    let profile = StrategyProfile::for_kind(StrategyKind::Balanced, 1.0);
    let c = generate(&profile, &view).expect("balanced candidate");

    assert!(c.steps[..4].iter().all(|s| s.action_kw > 0.0));
    assert!(c.steps[4..].iter().all(|s| s.action_kw < 0.0));
    assert!(c.profit_euro > 0.0);
    let last = c.steps.last().expect("non-empty");
    assert_abs_diff_eq!(last.soc_kwh, 300.0, epsilon = 1.0);
}

#[test]
fn engine_accepts_one_strategy_on_the_flat_spread() {
    let outcome =
        Engine::new(common::default_battery(), PipelineConfig::default()).run(&common::spread_horizon());

    assert_eq!(outcome.accepted.len(), 1);
    let accepted = &outcome.accepted[0];
    assert_eq!((accepted.start, accepted.end), (0, 8));
    assert!(accepted.profit_euro > 0.0);
    assert_abs_diff_eq!(outcome.schedule.final_soc_kwh, 300.0, epsilon = 1.0);
    // the losers on the same segment are overlaps, never silent drops
    assert!(
        outcome
            .rejected
            .iter()
            .all(|r| r.reason != RejectReason::CycleLimit)
    );
}

#[test]
fn zero_charge_headroom_declines_every_kind() {
    let battery = common::default_battery();
    // 300 -> 550 -> 800 -> 950 (clamped), then four idle steps at max SoC
    let horizon = Horizon::from_columns(
        common::start(),
        &[2000.0; 7],
        &[0.0; 7],
        &[1000.0, 1000.0, 1000.0, 0.0, 0.0, 0.0, 0.0],
        &[10.0, 20.0, 30.0, 5.0, 50.0, 5.0, 50.0],
    )
    .expect("valid horizon");
    let band = FlexibilityBand::compute(&horizon, &battery, BandOptions::default());
    let segment = Segment {
        id: 1,
        start: 3,
        end: 7,
    };
    let view = SegmentView::new(&segment, &horizon, &band, battery.bounds());
    assert_eq!(view.entry_soc_kwh, 950.0);

    for kind in StrategyKind::ALL {
        let profile = StrategyProfile {
            min_steps: 4,
            ..StrategyProfile::for_kind(kind, 1.0)
        };
        assert!(generate(&profile, &view).is_none(), "{kind} must decline");
    }
}

#[test]
fn soc_excursion_is_clamped_before_segmentation() {
    let battery = common::default_battery();
    let mut baseline = vec![1000.0; 13];
    baseline.push(400.0);
    baseline.extend([0.0; 6]);
    let n = baseline.len();
    let horizon = Horizon::from_columns(
        common::start(),
        &vec![2000.0; n],
        &vec![0.0; n],
        &baseline,
        &vec![20.0; n],
    )
    .expect("valid horizon");

    let outcome = Engine::new(battery, PipelineConfig::default()).run(&horizon);

    let max_projected = outcome
        .band
        .points()
        .iter()
        .map(|p| p.projected_soc_kwh)
        .fold(f64::MIN, f64::max);
    assert_abs_diff_eq!(max_projected, 950.0, epsilon = 1e-9);
    assert!(!outcome.band_corrections.is_empty());
    assert!(outcome.band_corrections.iter().all(|c| c.bound == Bound::Max));

    assert!(!outcome.schedule_corrections.is_empty());
    assert!(outcome.schedule.violations.is_empty());
    let max_soc = outcome
        .schedule
        .soc_kwh
        .iter()
        .copied()
        .fold(outcome.schedule.final_soc_kwh, f64::max);
    assert!(max_soc <= 950.0 + 1e-6);
}

#[test]
fn flat_prices_leave_the_baseline_untouched() {
    let horizon = common::idle_horizon(&[25.0; 32]);
    let outcome = Engine::new(common::default_battery(), PipelineConfig::default()).run(&horizon);
    assert!(outcome.accepted.is_empty());
    assert!(outcome.schedule.actions_kw.iter().all(|&a| a == 0.0));
    assert_eq!(outcome.stats.segments, 2);
}

#[test]
fn baseline_move_before_a_plateau_is_kept() {
    let battery = common::default_battery();
    let mut baseline = vec![0.0; 8];
    baseline[0] = 400.0;
    let horizon = common::spread_horizon()
        .with_baseline(&baseline)
        .expect("same length");

    let band = FlexibilityBand::compute(&horizon, &battery, BandOptions::default());
    let segments = find_segments(band.soc_before(0), band.points(), &SegmentRules::default());
    assert_eq!(segments, vec![Segment { id: 1, start: 1, end: 8 }]);

    let outcome = Engine::new(battery, PipelineConfig::default()).run(&horizon);
    assert_eq!(outcome.schedule.actions_kw[0], 400.0);
    assert_abs_diff_eq!(outcome.schedule.soc_kwh[1], 400.0, epsilon = 1e-9);

    assert_eq!(outcome.accepted.len(), 1);
    let accepted = &outcome.accepted[0];
    assert_eq!(accepted.start, 1);
    assert_abs_diff_eq!(accepted.entry_soc_kwh, 400.0, epsilon = 1e-9);
    assert!(accepted.profit_euro > 0.0);
}

/// 300 -> 940 kWh, eight idle steps, down to 200 kWh, eight idle steps.
/// Both plateaus are priced 90 then 10 ct.
fn draining_horizon() -> Horizon {
    let mut baseline = vec![1000.0, 1000.0, 560.0];
    baseline.extend([0.0; 8]);
    baseline.extend([-1000.0, -1000.0, -960.0]);
    baseline.extend([0.0; 8]);
    let plateau_prices = [90.0, 90.0, 90.0, 90.0, 10.0, 10.0, 10.0, 10.0];
    let mut prices = vec![50.0; 3];
    prices.extend(plateau_prices);
    prices.extend([50.0; 3]);
    prices.extend(plateau_prices);

    let n = baseline.len();
    Horizon::from_columns(
        common::start(),
        &vec![2000.0; n],
        &vec![0.0; n],
        &baseline,
        &prices,
    )
    .expect("valid horizon")
}

#[test]
fn strategy_starved_by_an_earlier_drain_falls_back_to_baseline() {
    let horizon = draining_horizon();
    let outcome = Engine::new(common::default_battery(), PipelineConfig::default()).run(&horizon);
    assert_eq!(
        outcome.segments,
        vec![
            Segment { id: 1, start: 3, end: 11 },
            Segment { id: 2, start: 14, end: 22 },
        ]
    );

    // the first plateau can barely recharge, so discharge-then-charge wins and
    // leaves the battery far lower than the baseline planned
    assert_eq!(outcome.accepted.len(), 1);
    let first = &outcome.accepted[0];
    assert_eq!(first.kind, StrategyKind::DischargeCharge);
    assert_eq!(first.start, 3);
    assert!(first.charged_kwh <= first.discharged_kwh + SOC_EPSILON);
    assert!(first.profit_euro > 0.0);

    // the baseline's own discharge then hits the floor before the second plateau
    assert!(
        outcome
            .schedule_corrections
            .iter()
            .any(|c| c.index == 13 && c.bound == Bound::Min)
    );

    // nothing is left to sell there, so the winner is dropped for the baseline
    let starved: Vec<_> = outcome
        .rejected
        .iter()
        .filter(|r| r.candidate.start == 14 && r.reason == RejectReason::Unprofitable)
        .collect();
    assert!(!starved.is_empty());
    assert!(starved.iter().all(|r| r.candidate.profit_euro <= 0.0));
    assert!(outcome.schedule.actions_kw[14..].iter().all(|&a| a == 0.0));
    assert!(outcome.schedule.violations.is_empty());

    assert_eq!(outcome.stats.accepted, 1);
    assert_eq!(
        outcome.stats.candidates_generated,
        outcome.stats.accepted
            + outcome.stats.rejected_unprofitable
            + outcome.stats.rejected_overlap
            + outcome.stats.rejected_cycle_limit
    );
}
