//! Per-hour objective coefficients.
//!
//! Discharge rewards follow the program that wins each hour. Charging is
//! rewarded inside the preferred windows and penalized elsewhere, and grid
//! draw is cheaper in the second window.

use serde::Serialize;

use super::{OptimizerSettings, ProgramSchedule};
use crate::domain::{hours, slot, BatteryProfile, Hour, HOURS_PER_DAY};

/// Per-hour objective coefficients of the dispatch model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostModel {
    /// Reward per unit discharged (negated in the objective)
    pub discharge_reward: [f64; HOURS_PER_DAY],
    pub charge_cost: [f64; HOURS_PER_DAY],
    pub grid_cost: [f64; HOURS_PER_DAY],
    /// Hours outside both preferred charging windows
    pub non_charging: [bool; HOURS_PER_DAY],
}

impl CostModel {
    pub fn build(
        battery: &BatteryProfile,
        programs: &ProgramSchedule,
        settings: &OptimizerSettings,
    ) -> Self {
        let costs = settings.costs;
        let mut model = Self {
            discharge_reward: [0.0; HOURS_PER_DAY],
            charge_cost: [costs.charge; HOURS_PER_DAY],
            grid_cost: [costs.grid; HOURS_PER_DAY],
            non_charging: [true; HOURS_PER_DAY],
        };

        for hour in hours() {
            let i = slot(hour);
            model.discharge_reward[i] = programs
                .winner(hour)
                .and_then(|p| settings.reward(p.priority))
                .unwrap_or(0.0);

            if battery.first_charging_window.contains(hour) {
                model.charge_cost[i] = costs.charge_in_window;
                model.grid_cost[i] = costs.grid;
                model.non_charging[i] = false;
            } else if battery.second_charging_window.contains(hour) {
                model.charge_cost[i] = costs.charge_in_window;
                model.grid_cost[i] = costs.grid_in_second_window;
                model.non_charging[i] = false;
            }
        }
        model
    }

    pub fn non_charging_hours(&self) -> Vec<Hour> {
        hours().filter(|h| self.non_charging[slot(*h)]).collect()
    }
}
