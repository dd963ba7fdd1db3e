use rand::{SeedableRng, rngs::StdRng};

use super::{Profile, gaussian_noise};
use crate::sim::types::STEPS_PER_DAY;

/// PV generation with a half-sine shape between sunrise and sunset.
///
/// Noise is multiplicative, so the output stays zero at night.
#[derive(Debug, Clone)]
pub struct SolarProfile {
    /// Output at solar noon under clear sky (kW).
    pub kw_peak: f64,
    /// Interval of the day when generation starts (inclusive).
    pub sunrise_step: usize,
    /// Interval of the day when generation ends (exclusive).
    pub sunset_step: usize,
    /// Relative noise, e.g. 0.05 for ±5 %.
    pub noise_std: f64,
    rng: StdRng,
}

impl SolarProfile {
    /// Creates a PV profile. A sunset at or before sunrise yields a profile
    /// that never generates.
    pub fn new(kw_peak: f64, sunrise_step: usize, sunset_step: usize, noise_std: f64, seed: u64) -> Self {
        Self {
            kw_peak: kw_peak.max(0.0),
            sunrise_step,
            sunset_step: sunset_step.min(STEPS_PER_DAY),
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Position within the daylight window mapped to `[0, 1]` via a half sine.
    fn daylight_frac(&self, step: usize) -> f64 {
        let t = step % STEPS_PER_DAY;
        if t < self.sunrise_step || t >= self.sunset_step {
            return 0.0;
        }
        let span = (self.sunset_step - self.sunrise_step) as f64;
        let x = (t - self.sunrise_step) as f64 + 0.5;
        (std::f64::consts::PI * x / span).sin()
    }
}

impl Profile for SolarProfile {
    fn value_at(&mut self, step: usize) -> f64 {
        let frac = self.daylight_frac(step);
        if frac <= 0.0 {
            return 0.0;
        }
        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        (self.kw_peak * frac * noise_mult).max(0.0)
    }

    fn name(&self) -> &'static str {
        "pv"
    }
}
