//! Tunable settings of the dispatch model: the big-M bound, the reward per
//! priority tier and the charge and grid cost coefficients.

use serde::{Deserialize, Serialize};

use super::OptimizationError;

/// Objective coefficients for charging and grid draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostCoefficients {
    /// Charge cost outside the preferred charging windows
    pub charge: f64,
    /// Charge cost inside either preferred charging window (negative rewards charging)
    pub charge_in_window: f64,
    /// Grid cost outside the second charging window
    pub grid: f64,
    /// Grid cost inside the second charging window
    pub grid_in_second_window: f64,
}

impl Default for CostCoefficients {
    fn default() -> Self {
        Self {
            charge: 10.0,
            charge_in_window: -10.0,
            grid: 1.0,
            grid_in_second_window: 0.0,
        }
    }
}

/// Tunables of the dispatch model, injected per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Big-M of the conditional constraints. Must exceed every power and SOC
    /// magnitude in the model.
    pub big_m: f64,
    /// Discharge reward per priority tier, tier 1 first.
    pub priority_rewards: Vec<f64>,
    pub costs: CostCoefficients,
    /// Powers at or below this are treated as zero when classifying hours.
    pub activity_epsilon: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            big_m: 5000.0,
            priority_rewards: vec![50000.0, 5000.0, 900.0, 300.0, 50.0],
            costs: CostCoefficients::default(),
            activity_epsilon: 1e-6,
        }
    }
}

impl OptimizerSettings {
    /// Reward of a priority tier, `None` for unknown tiers.
    pub fn reward(&self, tier: u8) -> Option<f64> {
        usize::from(tier)
            .checked_sub(1)
            .and_then(|i| self.priority_rewards.get(i))
            .copied()
    }

    pub fn validate(&self) -> Result<(), OptimizationError> {
        if !self.big_m.is_finite() || self.big_m <= 0.0 {
            return Err(OptimizationError::invalid(format!(
                "big_m must be a positive number, got {}",
                self.big_m
            )));
        }
        if self.priority_rewards.is_empty() {
            return Err(OptimizationError::invalid("priority reward table is empty"));
        }
        if self.priority_rewards.iter().any(|r| !r.is_finite()) {
            return Err(OptimizationError::invalid("priority rewards must be finite"));
        }
        let costs = &self.costs;
        if ![costs.charge, costs.charge_in_window, costs.grid, costs.grid_in_second_window]
            .iter()
            .all(|c| c.is_finite())
        {
            return Err(OptimizationError::invalid("cost coefficients must be finite"));
        }
        if self.activity_epsilon.is_nan() || self.activity_epsilon < 0.0 {
            return Err(OptimizationError::invalid("activity_epsilon must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reward_table() {
        let settings = OptimizerSettings::default();
        assert_eq!(settings.reward(1), Some(50000.0));
        assert_eq!(settings.reward(5), Some(50.0));
        assert_eq!(settings.reward(0), None);
        assert_eq!(settings.reward(6), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_big_m() {
        let settings = OptimizerSettings {
            big_m: 0.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: OptimizerSettings = serde_json::from_str(r#"{"big_m": 10000}"#).unwrap();
        assert_eq!(settings.big_m, 10000.0);
        assert_eq!(settings.priority_rewards.len(), 5);
    }
}
