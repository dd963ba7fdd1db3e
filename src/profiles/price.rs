use rand::{SeedableRng, rngs::StdRng};

use super::{Profile, gaussian_noise};
use crate::sim::types::STEPS_PER_DAY;

const MORNING_PEAK_HOUR: f64 = 8.0;
const MORNING_PEAK_WIDTH_H: f64 = 1.5;
const EVENING_PEAK_HOUR: f64 = 19.0;
const EVENING_PEAK_WIDTH_H: f64 = 2.0;

/// Day-ahead price curve with a morning and an evening peak.
///
/// Each peak is a Gaussian bump on top of a flat base price; additive noise
/// makes every interval distinct. Prices may go negative when the noise
/// exceeds the base.
#[derive(Debug, Clone)]
pub struct PriceProfile {
    /// Off-peak price (ct/kWh).
    pub base_ct: f64,
    /// Height of the morning bump (ct/kWh).
    pub morning_peak_ct: f64,
    /// Height of the evening bump (ct/kWh).
    pub evening_peak_ct: f64,
    /// Standard deviation of the noise (ct/kWh).
    pub noise_std_ct: f64,
    rng: StdRng,
}

impl PriceProfile {
    pub fn new(
        base_ct: f64,
        morning_peak_ct: f64,
        evening_peak_ct: f64,
        noise_std_ct: f64,
        seed: u64,
    ) -> Self {
        Self {
            base_ct,
            morning_peak_ct,
            evening_peak_ct,
            noise_std_ct: noise_std_ct.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Noise-free price at hour-of-day `hour`.
    pub fn shape_ct(&self, hour: f64) -> f64 {
        let bump = |centre: f64, width: f64| (-((hour - centre) / width).powi(2)).exp();
        self.base_ct
            + self.morning_peak_ct * bump(MORNING_PEAK_HOUR, MORNING_PEAK_WIDTH_H)
            + self.evening_peak_ct * bump(EVENING_PEAK_HOUR, EVENING_PEAK_WIDTH_H)
    }
}

impl Profile for PriceProfile {
    fn value_at(&mut self, step: usize) -> f64 {
        let hour = (step % STEPS_PER_DAY) as f64 * 24.0 / STEPS_PER_DAY as f64;
        self.shape_ct(hour) + gaussian_noise(&mut self.rng, self.noise_std_ct)
    }

    fn name(&self) -> &'static str {
        "price"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evening_peak_dominates_night() {
        let p = PriceProfile::new(8.0, 6.0, 12.0, 0.0, 42);
        assert!(p.shape_ct(19.0) > p.shape_ct(3.0) + 11.0);
        assert!(p.shape_ct(8.0) > p.shape_ct(3.0) + 5.0);
        assert!((p.shape_ct(3.0) - 8.0).abs() < 0.01);
    }

    #[test]
    fn noise_free_profile_repeats_daily() {
        let mut p = PriceProfile::new(8.0, 6.0, 12.0, 0.0, 42);
        let day1 = p.sample(STEPS_PER_DAY);
        let both = p.sample(2 * STEPS_PER_DAY);
        assert_eq!(&both[STEPS_PER_DAY..], day1.as_slice());
    }
}
