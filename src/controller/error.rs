use thiserror::Error;

use uuid::Uuid;

use crate::domain::BatteryId;
use crate::optimizer::OptimizationError;

/// Failures of a controller operation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown battery {0}")]
    UnknownBattery(BatteryId),

    #[error("battery {battery_id} has no program {program}")]
    UnknownProgram { battery_id: BatteryId, program: String },

    #[error("battery {battery_id} has no alarm {alarm_id}")]
    UnknownAlarm { battery_id: BatteryId, alarm_id: Uuid },

    #[error("alarm {0} was already handled")]
    AlarmHandled(Uuid),

    #[error(transparent)]
    Optimization(#[from] OptimizationError),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl DispatchError {
    /// Whether the next trigger may succeed with the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Optimization(e) => e.is_retryable(),
            Self::Storage(_) => true,
            Self::UnknownBattery(_)
            | Self::UnknownProgram { .. }
            | Self::UnknownAlarm { .. }
            | Self::AlarmHandled(_) => false,
        }
    }
}
