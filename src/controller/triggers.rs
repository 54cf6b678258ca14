//! What starts a run, and the change checks that decide whether an input
//! update needs one.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::domain::{Hour, ProgramActivation};
use crate::repo::consumption::HourValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    /// Load values for the rest of the day changed
    LoadUpdate,
    /// A program activation changed
    ProgramChange,
    /// Requested by an operator
    Manual,
    /// Scheduled recompute of every battery
    Periodic,
}

/// Outcome of comparing a received activation with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationChange {
    /// Nothing stored yet for the day
    First,
    /// Status flipped, or the window of an active program moved
    Alarm,
    /// Nothing that affects dispatch
    Unchanged,
}

pub fn classify_activation(
    previous: Option<&ProgramActivation>,
    current: &ProgramActivation,
) -> ActivationChange {
    let Some(previous) = previous else {
        return ActivationChange::First;
    };
    if previous.status != current.status {
        return ActivationChange::Alarm;
    }
    let moved = previous.start != current.start || previous.end != current.end;
    if current.status && moved {
        ActivationChange::Alarm
    } else {
        ActivationChange::Unchanged
    }
}

/// Describe what changed between two activations.
pub fn describe_change(previous: &ProgramActivation, current: &ProgramActivation) -> String {
    let mut parts = Vec::new();
    if previous.status != current.status {
        parts.push(format!("status {} -> {}", previous.status, current.status));
    }
    if previous.start != current.start {
        parts.push(format!("start {:?} -> {:?}", previous.start, current.start));
    }
    if previous.end != current.end {
        parts.push(format!("end {:?} -> {:?}", previous.end, current.end));
    }
    format!("{} {}", current.program, parts.join(", "))
}

/// Whether any hour after `clock_hour` differs between two load maps.
///
/// Hours `1..=clock_hour + 1` are already elapsed (frozen) and ignored.
pub fn future_load_changed(before: &HourValues, after: &HourValues, clock_hour: u32) -> bool {
    let first_future = clock_hour as usize + 2;
    (first_future..=crate::domain::HOURS_PER_DAY)
        .map(|h| h as Hour)
        .any(|h| before.get(&h) != after.get(&h))
}
