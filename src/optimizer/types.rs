use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::OptimizationError;
use crate::domain::{BatteryId, BatteryProfile, ChargingStatus, Hour, HourlyLoad, ProgramWindow};

/// Everything one optimization run needs, gathered by the caller up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchInput {
    pub load: HourlyLoad,
    pub battery: BatteryProfile,
    pub programs: Vec<ProgramWindow>,
    /// SOC before hour 1
    pub initial_soc: f64,
}

/// Solved values for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyDispatch {
    pub hour: Hour,
    pub discharge_power: f64,
    pub charge_power: f64,
    pub grid_power: f64,
    /// SOC at the end of the hour
    pub soc: f64,
    pub charging_status: ChargingStatus,
    /// 1 when an active program covers the hour
    pub charging_mode: u8,
    pub utility_power: f64,
}

/// Solved 24-hour dispatch of one battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    pub battery_id: BatteryId,
    pub initial_soc: f64,
    /// Objective value of the solved model
    pub objective: f64,
    pub hours: Vec<HourlyDispatch>,
}

impl DispatchPlan {
    pub fn hour(&self, hour: Hour) -> Option<&HourlyDispatch> {
        self.hours.iter().find(|h| h.hour == hour)
    }

    pub fn total_discharge(&self) -> f64 {
        self.hours.iter().map(|h| h.discharge_power).sum()
    }

    pub fn total_charge(&self) -> f64 {
        self.hours.iter().map(|h| h.charge_power).sum()
    }
}

/// A way of producing a day's dispatch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    async fn dispatch(&self, input: DispatchInput) -> Result<DispatchPlan, OptimizationError>;
}
