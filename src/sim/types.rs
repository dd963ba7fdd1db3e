//! Core data model: intervals, the input horizon and battery parameters.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::sim::soc::SocBounds;

/// Number of 15-minute intervals per hour. Power (kW) divided by this is the
/// energy (kWh) moved during one interval.
pub const STEPS_PER_HOUR: f64 = 4.0;

/// Number of intervals per day at the fixed 15-minute cadence.
pub const STEPS_PER_DAY: usize = 96;

/// Numerical tolerance for SoC bound checks (kWh).
pub const SOC_EPSILON: f64 = 1e-6;

/// Lower SoC bound as a fraction of capacity.
pub const MIN_SOC_FRACTION: f64 = 0.05;
/// Upper SoC bound as a fraction of capacity.
pub const MAX_SOC_FRACTION: f64 = 0.95;
/// SoC at the start of every horizon as a fraction of capacity.
pub const START_SOC_FRACTION: f64 = 0.30;

/// Energy moved in one interval at constant `power_kw`.
pub fn interval_energy_kwh(power_kw: f64) -> f64 {
    power_kw / STEPS_PER_HOUR
}

/// Length of one interval.
pub fn interval_duration() -> TimeDelta {
    TimeDelta::minutes(15)
}

/// One 15-minute interval of input data.
///
/// # Sign Convention
/// - `baseline_action_kw > 0`: the existing schedule charges the battery
/// - `baseline_action_kw < 0`: the existing schedule discharges the battery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Position in the horizon (0-based).
    pub index: usize,
    /// Start of the interval.
    pub timestamp: NaiveDateTime,
    /// Site consumption (kW, positive).
    pub load_kw: f64,
    /// PV generation (kW, positive).
    pub pv_kw: f64,
    /// Action of the pre-existing dispatch schedule (kW).
    pub baseline_action_kw: f64,
    /// Day-ahead price (ct/kWh).
    pub price_ct_per_kwh: f64,
}

/// The immutable input of one run: equal-length, fixed-cadence series.
#[derive(Debug, Clone, PartialEq)]
pub struct Horizon {
    intervals: Vec<Interval>,
}

impl Horizon {
    /// Wraps a prepared interval sequence after checking it.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::EmptyHorizon`] for an empty sequence and
    /// [`ScheduleError::NonFinite`] if any value is NaN or infinite.
    pub fn new(intervals: Vec<Interval>) -> Result<Self> {
        if intervals.is_empty() {
            return Err(ScheduleError::EmptyHorizon);
        }
        for (i, iv) in intervals.iter().enumerate() {
            for (series, value) in [
                ("load", iv.load_kw),
                ("pv", iv.pv_kw),
                ("baseline", iv.baseline_action_kw),
                ("price", iv.price_ct_per_kwh),
            ] {
                if !value.is_finite() {
                    return Err(ScheduleError::NonFinite { series, index: i });
                }
            }
        }
        Ok(Self { intervals })
    }

    /// Builds a horizon from four plain columns starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InputShape`] if the columns differ in length,
    /// plus everything [`Horizon::new`] rejects.
    pub fn from_columns(
        start: NaiveDateTime,
        load_kw: &[f64],
        pv_kw: &[f64],
        baseline_action_kw: &[f64],
        price_ct_per_kwh: &[f64],
    ) -> Result<Self> {
        let expected = load_kw.len();
        for (series, len) in [
            ("pv", pv_kw.len()),
            ("baseline", baseline_action_kw.len()),
            ("price", price_ct_per_kwh.len()),
        ] {
            if len != expected {
                return Err(ScheduleError::InputShape {
                    series,
                    expected,
                    actual: len,
                });
            }
        }

        let step = interval_duration();
        let mut timestamp = start;
        let mut intervals = Vec::with_capacity(expected);
        for i in 0..expected {
            intervals.push(Interval {
                index: i,
                timestamp,
                load_kw: load_kw[i],
                pv_kw: pv_kw[i],
                baseline_action_kw: baseline_action_kw[i],
                price_ct_per_kwh: price_ct_per_kwh[i],
            });
            timestamp += step;
        }
        Self::new(intervals)
    }

    /// Returns a copy of this horizon with the baseline schedule replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InputShape`] if `actions_kw` has the wrong length.
    pub fn with_baseline(&self, actions_kw: &[f64]) -> Result<Self> {
        if actions_kw.len() != self.len() {
            return Err(ScheduleError::InputShape {
                series: "baseline",
                expected: self.len(),
                actual: actions_kw.len(),
            });
        }
        let intervals = self
            .intervals
            .iter()
            .zip(actions_kw)
            .map(|(iv, &a)| Interval {
                baseline_action_kw: a,
                ..iv.clone()
            })
            .collect();
        Self::new(intervals)
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Largest site load over the horizon (kW).
    pub fn peak_load_kw(&self) -> f64 {
        self.intervals
            .iter()
            .map(|iv| iv.load_kw)
            .fold(0.0, f64::max)
    }

    /// Energy the baseline schedule charges over the whole horizon (kWh).
    pub fn baseline_charged_kwh(&self) -> f64 {
        self.intervals
            .iter()
            .filter(|iv| iv.baseline_action_kw > 0.0)
            .map(|iv| interval_energy_kwh(iv.baseline_action_kw))
            .sum()
    }
}

/// Nameplate data of the storage unit. Immutable for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryParams {
    /// Usable capacity (kWh).
    pub capacity_kwh: f64,
    /// Power rating for both directions (kW).
    pub power_kw: f64,
    /// Permitted full cycles per day, averaged over a year.
    pub daily_cycles: f64,
}

impl BatteryParams {
    /// Creates battery parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidBattery`] if any parameter is not a
    /// finite positive number.
    pub fn new(capacity_kwh: f64, power_kw: f64, daily_cycles: f64) -> Result<Self> {
        for (field, value) in [
            ("capacity_kwh", capacity_kwh),
            ("power_kw", power_kw),
            ("daily_cycles", daily_cycles),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScheduleError::InvalidBattery { field, value });
            }
        }
        Ok(Self {
            capacity_kwh,
            power_kw,
            daily_cycles,
        })
    }

    pub fn min_soc_kwh(&self) -> f64 {
        MIN_SOC_FRACTION * self.capacity_kwh
    }

    pub fn max_soc_kwh(&self) -> f64 {
        MAX_SOC_FRACTION * self.capacity_kwh
    }

    pub fn start_soc_kwh(&self) -> f64 {
        START_SOC_FRACTION * self.capacity_kwh
    }

    pub fn bounds(&self) -> SocBounds {
        SocBounds::new(self.min_soc_kwh(), self.max_soc_kwh())
    }

    /// Charged energy permitted per year: `capacity × daily_cycles × 365` (kWh).
    pub fn annual_charge_budget_kwh(&self) -> f64 {
        self.capacity_kwh * self.daily_cycles * 365.0
    }
}
