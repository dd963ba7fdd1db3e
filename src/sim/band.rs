//! Flexibility band: feasible charge/discharge power per interval around the
//! baseline schedule.

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::soc::Bound;
use super::types::{BatteryParams, Horizon, STEPS_PER_HOUR};

/// Feasible headroom at one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandPoint {
    /// Additional charge power available (kW, ≥ 0).
    pub charge_potential_kw: f64,
    /// Additional discharge power available (kW, ≥ 0).
    pub discharge_potential_kw: f64,
    /// SoC after the baseline action of this interval, clamped (kWh).
    pub projected_soc_kwh: f64,
}

/// An interval whose baseline action would have left the legal SoC range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaselineCorrection {
    pub index: usize,
    /// Baseline action as given (kW).
    pub requested_kw: f64,
    /// Largest legal action in the same direction (kW).
    pub corrected_kw: f64,
    pub bound: Bound,
}

/// Optional caps applied on top of the SoC and power limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandOptions {
    /// Cap discharge so that `load + action − pv` never goes negative.
    pub load_safeguard: bool,
    /// Cap charge so that `load + action` never exceeds the horizon's load peak.
    pub peak_guard: bool,
}

impl Default for BandOptions {
    fn default() -> Self {
        Self {
            load_safeguard: true,
            peak_guard: false,
        }
    }
}

/// Band points for the whole horizon, computed once and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FlexibilityBand {
    points: Vec<BandPoint>,
    start_soc_kwh: f64,
    corrections: Vec<BaselineCorrection>,
}

impl FlexibilityBand {
    /// Walks the horizon once, threading the SoC through every interval.
    ///
    /// The first interval starts at the battery's start SoC. Baseline actions
    /// that would push the SoC out of range are clamped and recorded as
    /// [`BaselineCorrection`]s; an illegal SoC is never carried forward.
    #[instrument(skip_all, fields(intervals = horizon.len(), capacity_kwh = battery.capacity_kwh))]
    pub fn compute(horizon: &Horizon, battery: &BatteryParams, options: BandOptions) -> Self {
        let bounds = battery.bounds();
        let peak_load = horizon.peak_load_kw();
        let start_soc = battery.start_soc_kwh();

        let mut soc = start_soc;
        let mut points = Vec::with_capacity(horizon.len());
        let mut corrections = Vec::new();

        for iv in horizon.intervals() {
            let mut charge = battery
                .power_kw
                .min((bounds.max_kwh - soc) * STEPS_PER_HOUR)
                .max(0.0);
            let mut discharge = battery
                .power_kw
                .min((soc - bounds.min_kwh) * STEPS_PER_HOUR)
                .max(0.0);

            if options.load_safeguard {
                discharge = discharge.min((iv.load_kw - iv.pv_kw).max(0.0));
            }
            if options.peak_guard {
                charge = charge.min((peak_load - iv.load_kw).max(0.0));
            }

            let unclamped = soc + iv.baseline_action_kw / STEPS_PER_HOUR;
            if let Some(bound) = bounds.breach(unclamped) {
                let corrected_kw = bounds.limit_action(soc, iv.baseline_action_kw);
                corrections.push(BaselineCorrection {
                    index: iv.index,
                    requested_kw: iv.baseline_action_kw,
                    corrected_kw,
                    bound,
                });
            }
            soc = bounds.clamp(unclamped);

            points.push(BandPoint {
                charge_potential_kw: charge,
                discharge_potential_kw: discharge,
                projected_soc_kwh: soc,
            });
        }

        if !corrections.is_empty() {
            warn!(
                count = corrections.len(),
                first_index = corrections[0].index,
                "baseline schedule leaves SoC bounds; clamped"
            );
        }
        info!(points = points.len(), "flexibility band computed");

        Self {
            points,
            start_soc_kwh: start_soc,
            corrections,
        }
    }

    pub fn points(&self) -> &[BandPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// SoC entering interval `index`: the start SoC for the first interval,
    /// otherwise the projected SoC of the previous one.
    pub fn soc_before(&self, index: usize) -> f64 {
        match index.checked_sub(1).and_then(|i| self.points.get(i)) {
            Some(prev) => prev.projected_soc_kwh,
            None => self.start_soc_kwh,
        }
    }

    pub fn corrections(&self) -> &[BaselineCorrection] {
        &self.corrections
    }
}
