use rand::{SeedableRng, rngs::StdRng};

use super::{Profile, gaussian_noise};
use crate::sim::types::STEPS_PER_DAY;

/// Site consumption with a daily sinusoid and Gaussian noise.
///
/// The sinusoid is phased so that consumption is lowest at midnight and
/// highest at noon.
///
/// # Examples
///
/// ```
/// use bess_arbitrage::profiles::{LoadProfile, Profile};
///
/// let mut load = LoadProfile::new(400.0, 150.0, 0.0, 42);
/// let noon = load.value_at(48);
/// assert!((noon - 550.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct LoadProfile {
    /// Mean consumption (kW).
    pub base_kw: f64,
    /// Half the daily swing (kW).
    pub amp_kw: f64,
    /// Standard deviation of the noise (kW).
    pub noise_std_kw: f64,
    rng: StdRng,
}

impl LoadProfile {
    pub fn new(base_kw: f64, amp_kw: f64, noise_std_kw: f64, seed: u64) -> Self {
        Self {
            base_kw,
            amp_kw,
            noise_std_kw: noise_std_kw.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Profile for LoadProfile {
    /// Consumption at `step`, never negative.
    fn value_at(&mut self, step: usize) -> f64 {
        let day_pos = (step % STEPS_PER_DAY) as f64 / STEPS_PER_DAY as f64;
        let angle = 2.0 * std::f64::consts::PI * day_pos - std::f64::consts::FRAC_PI_2;
        let kw = self.base_kw + self.amp_kw * angle.sin() + gaussian_noise(&mut self.rng, self.noise_std_kw);
        kw.max(0.0)
    }

    fn name(&self) -> &'static str {
        "load"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_at_midnight() {
        let mut load = LoadProfile::new(400.0, 150.0, 0.0, 1);
        assert!((load.value_at(0) - 250.0).abs() < 1e-9);
        assert!((load.value_at(STEPS_PER_DAY) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn never_negative() {
        let mut load = LoadProfile::new(10.0, 50.0, 5.0, 3);
        assert!(load.sample(2 * STEPS_PER_DAY).iter().all(|&kw| kw >= 0.0));
    }

    #[test]
    fn same_seed_same_series() {
        let a = LoadProfile::new(400.0, 150.0, 20.0, 42).sample(96);
        let b = LoadProfile::new(400.0, 150.0, 20.0, 42).sample(96);
        let c = LoadProfile::new(400.0, 150.0, 20.0, 43).sample(96);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
