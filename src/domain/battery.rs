use serde::{Deserialize, Serialize};

use super::{BatteryId, HourRange};
use crate::optimizer::OptimizationError;

/// Physical and operational constants of one battery.
///
/// Energies (`soc_*`) and powers (`p_*`) share the same unit base, one hourly
/// slot of power moves the same amount of energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryProfile {
    pub id: BatteryId,
    pub name: String,
    /// Maximum state of charge
    pub soc_max: f64,
    /// Minimum state of charge, `soc_max * soc_min_coefficient`
    pub soc_min: f64,
    /// Maximum discharge power
    pub p_max: f64,
    /// Maximum charge power
    pub p_charge_max: f64,
    /// Upper feeder limit (reported, not constrained)
    pub feeder_max: f64,
    /// Margin kept below the feeder limit while charging (reported, not constrained)
    pub charging_margin: f64,
    /// Preferred charging hours, typically the late evening
    pub first_charging_window: HourRange,
    /// Preferred charging hours with the discounted grid cost, typically early morning
    pub second_charging_window: HourRange,
}

impl BatteryProfile {
    /// Build a profile whose `soc_min` is derived from `soc_max`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: BatteryId,
        name: impl Into<String>,
        soc_max: f64,
        soc_min_coefficient: f64,
        p_max: f64,
        p_charge_max: f64,
        first_charging_window: HourRange,
        second_charging_window: HourRange,
    ) -> Result<Self, OptimizationError> {
        if !(0.0..1.0).contains(&soc_min_coefficient) {
            return Err(OptimizationError::invalid(format!(
                "soc_min_coefficient {soc_min_coefficient} must be in [0, 1)"
            )));
        }
        let profile = Self {
            id,
            name: name.into(),
            soc_max,
            soc_min: soc_max * soc_min_coefficient,
            p_max,
            p_charge_max,
            feeder_max: 0.0,
            charging_margin: 0.0,
            first_charging_window,
            second_charging_window,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn with_feeder(mut self, feeder_max: f64, charging_margin: f64) -> Self {
        self.feeder_max = feeder_max;
        self.charging_margin = charging_margin;
        self
    }

    /// Check the limits the optimizer relies on.
    pub fn validate(&self) -> Result<(), OptimizationError> {
        let finite = [
            self.soc_max,
            self.soc_min,
            self.p_max,
            self.p_charge_max,
            self.feeder_max,
            self.charging_margin,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(OptimizationError::invalid(format!(
                "battery {} has non-finite limits",
                self.id
            )));
        }
        if self.soc_max <= 0.0 {
            return Err(OptimizationError::invalid(format!(
                "battery {}: soc_max must be positive, got {}",
                self.id, self.soc_max
            )));
        }
        if self.p_max <= 0.0 {
            return Err(OptimizationError::invalid(format!(
                "battery {}: p_max must be positive, got {}",
                self.id, self.p_max
            )));
        }
        if self.p_charge_max < 0.0 {
            return Err(OptimizationError::invalid(format!(
                "battery {}: p_charge_max must not be negative, got {}",
                self.id, self.p_charge_max
            )));
        }
        if self.soc_min < 0.0 || self.soc_min >= self.soc_max {
            return Err(OptimizationError::invalid(format!(
                "battery {}: soc_min {} must be in [0, soc_max)",
                self.id, self.soc_min
            )));
        }
        if self
            .first_charging_window
            .overlaps(&self.second_charging_window)
        {
            return Err(OptimizationError::invalid(format!(
                "battery {}: charging windows {} and {} overlap",
                self.id, self.first_charging_window, self.second_charging_window
            )));
        }
        Ok(())
    }

    pub fn in_charging_window(&self, hour: u8) -> bool {
        self.first_charging_window.contains(hour) || self.second_charging_window.contains(hour)
    }

    /// Clamp a state of charge into the usable band.
    pub fn clamp_soc(&self, soc: f64) -> f64 {
        soc.clamp(self.soc_min, self.soc_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows() -> (HourRange, HourRange) {
        (
            HourRange::new(22, 24).unwrap(),
            HourRange::new(2, 10).unwrap(),
        )
    }

    #[test]
    fn test_soc_min_derived_from_coefficient() {
        let (first, second) = windows();
        let battery = BatteryProfile::new(1, "pcs", 1000.0, 0.1, 500.0, 120.0, first, second).unwrap();
        assert!((battery.soc_min - 100.0).abs() < 1e-9);
        assert!(battery.in_charging_window(23));
        assert!(battery.in_charging_window(2));
        assert!(!battery.in_charging_window(15));
    }

    #[test]
    fn test_non_positive_limits_rejected() {
        let (first, second) = windows();
        assert!(BatteryProfile::new(1, "pcs", 0.0, 0.1, 500.0, 120.0, first, second).is_err());
        assert!(BatteryProfile::new(1, "pcs", 1000.0, 0.1, 0.0, 120.0, first, second).is_err());
        assert!(BatteryProfile::new(1, "pcs", 1000.0, 0.1, 500.0, -1.0, first, second).is_err());
        assert!(BatteryProfile::new(1, "pcs", 1000.0, 1.2, 500.0, 120.0, first, second).is_err());
    }

    #[test]
    fn test_zero_charge_power_is_allowed() {
        let (first, second) = windows();
        assert!(BatteryProfile::new(1, "pcs", 1000.0, 0.1, 500.0, 0.0, first, second).is_ok());
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        let first = HourRange::new(8, 12).unwrap();
        let second = HourRange::new(2, 10).unwrap();
        let err = BatteryProfile::new(1, "pcs", 1000.0, 0.1, 500.0, 120.0, first, second).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }
}
