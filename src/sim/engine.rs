//! Pipeline engine: band → segments → candidates → selection → schedule.

use std::num::NonZeroUsize;
use std::thread;

use tracing::{debug, info, instrument};

use super::band::{BandOptions, BaselineCorrection, FlexibilityBand};
use super::implement::{ImplementedSchedule, implement};
use super::segment::{Segment, SegmentRules, find_segments};
use super::types::{BatteryParams, Horizon};
use crate::strategy::{
    CycleBudget, RejectReason, Rejection, SegmentView, StrategyCandidate, StrategyKind,
    StrategyProfile, Validated, generate, select, validate,
};

/// Tunables of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub band: BandOptions,
    pub segments: SegmentRules,
    /// Generator profiles, applied to every segment in this order.
    pub strategies: Vec<StrategyProfile>,
    /// Count the baseline's own charging against the annual cycle budget.
    pub count_baseline_charging: bool,
    /// Worker threads for segment evaluation; 0 means available parallelism.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            band: BandOptions::default(),
            segments: SegmentRules::default(),
            strategies: StrategyKind::ALL
                .into_iter()
                .map(|k| StrategyProfile::for_kind(k, 1.0))
                .collect(),
            count_baseline_charging: false,
            workers: 0,
        }
    }
}

/// Pipeline counters reported with every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunStats {
    pub segments: usize,
    pub candidates_generated: usize,
    pub declined: usize,
    pub rejected_unprofitable: usize,
    pub rejected_overlap: usize,
    pub rejected_cycle_limit: usize,
    pub accepted: usize,
    /// Accepted strategies changed by chronological re-validation.
    pub repaired: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub band: FlexibilityBand,
    pub segments: Vec<Segment>,
    /// Accepted strategies in chronological order, as implemented.
    pub accepted: Vec<StrategyCandidate>,
    pub rejected: Vec<Rejection>,
    pub schedule: ImplementedSchedule,
    /// Baseline corrections from the band pass and the implementer.
    pub band_corrections: Vec<BaselineCorrection>,
    pub schedule_corrections: Vec<BaselineCorrection>,
    pub budget: CycleBudget,
    pub stats: RunStats,
}

impl RunOutcome {
    pub fn total_profit_euro(&self) -> f64 {
        self.accepted.iter().map(|c| c.profit_euro).sum()
    }
}

/// Per-segment result, kept in profile order.
#[derive(Debug, Default)]
struct SegmentEvaluation {
    validated: Vec<Validated>,
    declined: usize,
}

/// Runs the arbitrage pipeline for one battery.
#[derive(Debug, Clone)]
pub struct Engine {
    battery: BatteryParams,
    config: PipelineConfig,
}

impl Engine {
    pub fn new(battery: BatteryParams, config: PipelineConfig) -> Self {
        Self { battery, config }
    }

    pub fn battery(&self) -> &BatteryParams {
        &self.battery
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Executes the full pipeline over `horizon`.
    ///
    /// The band and the final trajectory are strict sequential scans. Segment
    /// evaluation runs on worker threads; results are merged back in segment
    /// order, so the outcome does not depend on the worker count.
    #[instrument(skip_all, fields(intervals = horizon.len(), capacity_kwh = self.battery.capacity_kwh))]
    pub fn run(&self, horizon: &Horizon) -> RunOutcome {
        let bounds = self.battery.bounds();

        // 1. Flexibility band
        let band = FlexibilityBand::compute(horizon, &self.battery, self.config.band);

        // 2. Constant-SoC segments
        let segments = find_segments(band.soc_before(0), band.points(), &self.config.segments);

        // 3. Candidate generation and validation per segment
        let evaluations = self.evaluate_segments(horizon, &band, &segments);

        let mut stats = RunStats {
            segments: segments.len(),
            ..RunStats::default()
        };
        let mut feasible = Vec::new();
        let mut rejected = Vec::new();
        let mut next_id = 1;
        for evaluation in evaluations {
            stats.declined += evaluation.declined;
            for validated in evaluation.validated {
                stats.candidates_generated += 1;
                match validated {
                    Validated::Feasible { mut candidate, .. } => {
                        candidate.id = next_id;
                        feasible.push(candidate);
                    }
                    Validated::Unprofitable(mut candidate) => {
                        candidate.id = next_id;
                        rejected.push(Rejection {
                            candidate,
                            reason: RejectReason::Unprofitable,
                        });
                    }
                }
                next_id += 1;
            }
        }
        info!(
            generated = stats.candidates_generated,
            declined = stats.declined,
            feasible = feasible.len(),
            "candidates evaluated"
        );

        // 4. Selection under overlap and cycle budget
        let mut budget = CycleBudget::annual(&self.battery);
        if self.config.count_baseline_charging {
            budget = budget.with_usage(horizon.baseline_charged_kwh());
        }
        let baseline_usage_kwh = budget.used_kwh;
        let selection = select(feasible, budget);
        rejected.extend(selection.rejected);

        // 5. Implementation
        let implementation = implement(horizon, &self.battery, &band, selection.accepted);
        rejected.extend(implementation.rejected);

        // re-validation only shrinks or drops strategies; book what is implemented
        let budget = CycleBudget {
            used_kwh: baseline_usage_kwh
                + implementation
                    .strategies
                    .iter()
                    .map(|c| c.charged_kwh)
                    .sum::<f64>(),
            ..selection.budget
        };

        for r in &rejected {
            match r.reason {
                RejectReason::Unprofitable => stats.rejected_unprofitable += 1,
                RejectReason::Overlap => stats.rejected_overlap += 1,
                RejectReason::CycleLimit => stats.rejected_cycle_limit += 1,
            }
        }
        stats.accepted = implementation.strategies.len();
        stats.repaired = implementation.repaired;

        let outcome = RunOutcome {
            band_corrections: band.corrections().to_vec(),
            band,
            segments,
            accepted: implementation.strategies,
            rejected,
            schedule: implementation.schedule,
            schedule_corrections: implementation.corrections,
            budget,
            stats,
        };
        info!(
            accepted = outcome.stats.accepted,
            profit_euro = outcome.total_profit_euro(),
            violations = outcome.schedule.violations.len(),
            bounds_min = bounds.min_kwh,
            bounds_max = bounds.max_kwh,
            "run complete"
        );
        outcome
    }

    fn worker_count(&self, jobs: usize) -> usize {
        let wanted = match self.config.workers {
            0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        };
        wanted.min(jobs).max(1)
    }

    fn evaluate_segments(
        &self,
        horizon: &Horizon,
        band: &FlexibilityBand,
        segments: &[Segment],
    ) -> Vec<SegmentEvaluation> {
        let workers = self.worker_count(segments.len());
        if workers <= 1 {
            return segments
                .iter()
                .map(|s| self.evaluate_segment(horizon, band, s))
                .collect();
        }

        let chunk_len = segments.len().div_ceil(workers);
        thread::scope(|scope| {
            let handles: Vec<_> = segments
                .chunks(chunk_len)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|s| self.evaluate_segment(horizon, band, s))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }

    fn evaluate_segment(
        &self,
        horizon: &Horizon,
        band: &FlexibilityBand,
        segment: &Segment,
    ) -> SegmentEvaluation {
        let bounds = self.battery.bounds();
        let view = SegmentView::new(segment, horizon, band, bounds);
        let mut evaluation = SegmentEvaluation::default();

        for profile in &self.config.strategies {
            match generate(profile, &view) {
                Some(candidate) => evaluation.validated.push(validate(
                    candidate,
                    view.entry_soc_kwh,
                    view.band,
                    &bounds,
                )),
                None => evaluation.declined += 1,
            }
        }
        debug!(
            segment = segment.id,
            start = segment.start,
            len = segment.len(),
            candidates = evaluation.validated.len(),
            declined = evaluation.declined,
            "segment evaluated"
        );
        evaluation
    }
}
