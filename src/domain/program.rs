use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BatteryId, HourRange};
use crate::optimizer::OptimizationError;

/// One incentive program's activation for a day, as the optimizer consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramWindow {
    pub name: String,
    /// Priority tier, 1 is the most valuable.
    pub priority: u8,
    pub is_active: bool,
    /// Activation hours, `None` when the program is not active.
    pub active_hours: Option<HourRange>,
}

impl ProgramWindow {
    pub fn active(name: impl Into<String>, priority: u8, hours: HourRange) -> Self {
        Self {
            name: name.into(),
            priority,
            is_active: true,
            active_hours: Some(hours),
        }
    }

    pub fn inactive(name: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            priority,
            is_active: false,
            active_hours: None,
        }
    }

    /// The hours this program actually covers.
    pub fn effective_hours(&self) -> Option<HourRange> {
        if self.is_active {
            self.active_hours
        } else {
            None
        }
    }
}

/// A configured program of a battery (name and tier, no daily state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    pub name: String,
    pub priority: u8,
}

/// Daily activation signal received for a program.
///
/// `start`/`end` are clock hours (0..=23) as upstream signals report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramActivation {
    pub battery_id: BatteryId,
    pub program: String,
    pub date: NaiveDate,
    pub status: bool,
    pub start: Option<u8>,
    pub end: Option<u8>,
    #[serde(default)]
    pub is_manual: bool,
}

impl ProgramActivation {
    /// Resolve the activation against the program definition.
    pub fn to_window(&self, definition: &ProgramDefinition) -> Result<ProgramWindow, OptimizationError> {
        if !self.status {
            return Ok(ProgramWindow::inactive(&definition.name, definition.priority));
        }
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(ProgramWindow::active(
                &definition.name,
                definition.priority,
                HourRange::from_clock_hours(start, end)?,
            )),
            _ => Err(OptimizationError::invalid(format!(
                "program {} is active without an activation window",
                self.program
            ))),
        }
    }
}
