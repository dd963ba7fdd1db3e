//! Deterministic synthetic input series.
//!
//! Used when a scenario names no CSV inputs: every series is generated from a
//! seeded RNG so that a preset always yields the same horizon.

pub mod baseline;
pub mod load;
pub mod price;
pub mod solar;

use chrono::NaiveTime;
use rand::{Rng, rngs::StdRng};
use tracing::{debug, instrument};

use crate::config::SyntheticConfig;
use crate::error::Result;
use crate::sim::types::{BatteryParams, Horizon, STEPS_PER_DAY};

pub use baseline::BaselinePlanner;
pub use load::LoadProfile;
pub use price::PriceProfile;
pub use solar::SolarProfile;

/// A per-interval series generator.
pub trait Profile {
    /// Value at interval `step` (0-based from the start of the horizon).
    fn value_at(&mut self, step: usize) -> f64;

    /// Human-readable series name.
    fn name(&self) -> &'static str;

    /// Samples the first `steps` intervals in order.
    fn sample(&mut self, steps: usize) -> Vec<f64> {
        (0..steps).map(|t| self.value_at(t)).collect()
    }
}

/// Gaussian noise with mean 0 via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std_dev
}

/// Converts an hour of day to an interval index within the day.
pub fn hour_to_step(hour: f64) -> usize {
    let steps = (hour * STEPS_PER_DAY as f64 / 24.0).round();
    (steps.max(0.0) as usize).min(STEPS_PER_DAY)
}

/// Generates a full horizon from the synthetic section of a scenario.
///
/// Each series gets its own seed derived from `cfg.seed`, so changing one
/// shape parameter never reshuffles the noise of the others.
///
/// # Errors
///
/// Propagates horizon construction errors (an empty horizon for `days = 0`).
#[instrument(skip_all, fields(days = cfg.days, seed = cfg.seed))]
pub fn synthetic_horizon(cfg: &SyntheticConfig, battery: &BatteryParams) -> Result<Horizon> {
    let steps = cfg.days * STEPS_PER_DAY;

    let mut load = LoadProfile::new(
        cfg.load_base_kw,
        cfg.load_amp_kw,
        cfg.load_noise_kw,
        cfg.seed,
    );
    let mut pv = SolarProfile::new(
        cfg.pv_peak_kw,
        hour_to_step(cfg.sunrise_hour),
        hour_to_step(cfg.sunset_hour),
        cfg.pv_noise,
        cfg.seed.wrapping_add(1),
    );
    let mut price = PriceProfile::new(
        cfg.price_base_ct,
        cfg.price_morning_peak_ct,
        cfg.price_evening_peak_ct,
        cfg.price_noise_ct,
        cfg.seed.wrapping_add(2),
    );

    let load_kw = load.sample(steps);
    let pv_kw = pv.sample(steps);
    let price_ct = price.sample(steps);

    let planner = BaselinePlanner {
        target_soc_fraction: cfg.baseline_target_soc,
        floor_soc_fraction: cfg.baseline_floor_soc,
        evening_start_step: hour_to_step(cfg.evening_start_hour),
        evening_end_step: hour_to_step(cfg.evening_end_hour),
    };
    let baseline_kw = planner.plan(battery, &load_kw, &pv_kw);

    debug!(
        steps,
        load = load.name(),
        pv = pv.name(),
        price = price.name(),
        "synthetic series generated"
    );

    let start = cfg.start_date.and_time(NaiveTime::MIN);
    Horizon::from_columns(start, &load_kw, &pv_kw, &baseline_kw, &price_ct)
}
