use crate::sim::types::{
    BatteryParams, MAX_SOC_FRACTION, MIN_SOC_FRACTION, STEPS_PER_DAY, STEPS_PER_HOUR,
};

/// Rule-based self-consumption schedule used as the synthetic baseline.
///
/// Charges from PV surplus until the target SoC is reached and discharges
/// linearly towards the floor SoC during the evening window, never beyond the
/// site's net load. Outside those windows the battery idles, which is where
/// constant-SoC segments appear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselinePlanner {
    /// SoC the PV charging stops at, as a fraction of capacity.
    pub target_soc_fraction: f64,
    /// SoC the evening discharge stops at, as a fraction of capacity.
    pub floor_soc_fraction: f64,
    /// First interval of the day in the discharge window.
    pub evening_start_step: usize,
    /// First interval of the day after the discharge window.
    pub evening_end_step: usize,
}

impl BaselinePlanner {
    /// Plans one action per interval. `load_kw` and `pv_kw` must have equal
    /// length; the plan is as long as the shorter of the two.
    pub fn plan(&self, battery: &BatteryParams, load_kw: &[f64], pv_kw: &[f64]) -> Vec<f64> {
        let cap = battery.capacity_kwh;
        let target = cap * self.target_soc_fraction.clamp(MIN_SOC_FRACTION, MAX_SOC_FRACTION);
        let floor = cap * self.floor_soc_fraction.clamp(MIN_SOC_FRACTION, MAX_SOC_FRACTION);
        let mut soc = battery.start_soc_kwh();

        load_kw
            .iter()
            .zip(pv_kw)
            .enumerate()
            .map(|(t, (&load, &pv))| {
                let day_step = t % STEPS_PER_DAY;
                let surplus = pv - load;
                let in_evening =
                    day_step >= self.evening_start_step && day_step < self.evening_end_step;

                let action = if surplus > 0.0 && soc < target {
                    surplus
                        .min(battery.power_kw)
                        .min((target - soc) * STEPS_PER_HOUR)
                } else if in_evening && soc > floor {
                    let remaining = (self.evening_end_step - day_step) as f64;
                    -((soc - floor) * STEPS_PER_HOUR / remaining)
                        .min(battery.power_kw)
                        .min((-surplus).max(0.0))
                } else {
                    0.0
                };
                soc += action / STEPS_PER_HOUR;
                action
            })
            .collect()
    }
}
