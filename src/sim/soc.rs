//! State-of-charge bounds: the clamp primitive every other stage builds on.

use std::fmt;

use serde::Serialize;

use super::types::{SOC_EPSILON, STEPS_PER_HOUR};

/// Which side of the legal SoC range was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Min,
    Max,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => write!(f, "min_soc"),
            Self::Max => write!(f, "max_soc"),
        }
    }
}

/// Legal SoC range `[min_kwh, max_kwh]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocBounds {
    pub min_kwh: f64,
    pub max_kwh: f64,
}

impl SocBounds {
    pub fn new(min_kwh: f64, max_kwh: f64) -> Self {
        Self { min_kwh, max_kwh }
    }

    /// Forces `soc` into the legal range.
    pub fn clamp(&self, soc_kwh: f64) -> f64 {
        soc_kwh.clamp(self.min_kwh, self.max_kwh)
    }

    /// Reports the breached bound, ignoring excursions below [`SOC_EPSILON`].
    pub fn breach(&self, soc_kwh: f64) -> Option<Bound> {
        if soc_kwh < self.min_kwh - SOC_EPSILON {
            Some(Bound::Min)
        } else if soc_kwh > self.max_kwh + SOC_EPSILON {
            Some(Bound::Max)
        } else {
            None
        }
    }

    pub fn contains(&self, soc_kwh: f64) -> bool {
        self.breach(soc_kwh).is_none()
    }

    /// Reduces `action_kw` to the largest magnitude, in the same direction,
    /// that keeps the SoC after the interval inside the bounds.
    ///
    /// Never flips the sign of the action: a charge is reduced at most to
    /// zero, likewise a discharge.
    pub fn limit_action(&self, soc_before_kwh: f64, action_kw: f64) -> f64 {
        let soc_after = soc_before_kwh + action_kw / STEPS_PER_HOUR;
        match self.breach(soc_after) {
            Some(Bound::Max) if action_kw > 0.0 => {
                ((self.max_kwh - soc_before_kwh) * STEPS_PER_HOUR).clamp(0.0, action_kw)
            }
            Some(Bound::Min) if action_kw < 0.0 => {
                ((self.min_kwh - soc_before_kwh) * STEPS_PER_HOUR).clamp(action_kw, 0.0)
            }
            _ => action_kw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> SocBounds {
        SocBounds::new(50.0, 950.0)
    }

    #[test]
    fn clamp_enforces_range() {
        let b = bounds();
        assert_eq!(b.clamp(3650.0), 950.0);
        assert_eq!(b.clamp(-10.0), 50.0);
        assert_eq!(b.clamp(300.0), 300.0);
    }

    #[test]
    fn breach_uses_tolerance() {
        let b = bounds();
        assert_eq!(b.breach(950.0 + 1e-9), None);
        assert_eq!(b.breach(951.0), Some(Bound::Max));
        assert_eq!(b.breach(49.0), Some(Bound::Min));
    }

    #[test]
    fn limit_action_reduces_charge_to_headroom() {
        // 50 kWh headroom = 200 kW over one interval
        let a = bounds().limit_action(900.0, 1000.0);
        assert!((a - 200.0).abs() < 1e-9);
    }

    #[test]
    fn limit_action_reduces_discharge_to_floor() {
        let a = bounds().limit_action(60.0, -1000.0);
        assert!((a + 40.0).abs() < 1e-9);
    }

    #[test]
    fn limit_action_never_flips_direction() {
        // already above max: a charge can only be cut to zero
        assert_eq!(bounds().limit_action(960.0, 100.0), 0.0);
        // legal discharge from an illegal start is left alone
        assert_eq!(bounds().limit_action(960.0, -100.0), -100.0);
    }
}
