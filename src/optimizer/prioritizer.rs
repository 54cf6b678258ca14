//! Resolution of overlapping incentive programs into one winner per hour.
//!
//! Programs are ranked by priority tier (tier 1 first, ties keep their input
//! order). Each hour goes to the first ranked active program whose window
//! covers it; lower ranked programs never take an hour that is already
//! assigned. Hours no active program covers are *inactive*.

use itertools::Itertools;

use super::{OptimizationError, OptimizerSettings};
use crate::domain::{hours, slot, Hour, ProgramWindow, HOURS_PER_DAY};

/// Per-hour program attribution for one day.
#[derive(Debug, Clone)]
pub struct ProgramSchedule {
    ranked: Vec<ProgramWindow>,
    winners: [Option<usize>; HOURS_PER_DAY],
}

impl ProgramSchedule {
    /// The program that owns `hour`, if any.
    pub fn winner(&self, hour: Hour) -> Option<&ProgramWindow> {
        self.winners[slot(hour)].map(|i| &self.ranked[i])
    }

    pub fn is_inactive(&self, hour: Hour) -> bool {
        self.winners[slot(hour)].is_none()
    }

    pub fn inactive_hours(&self) -> Vec<Hour> {
        hours().filter(|h| self.is_inactive(*h)).collect()
    }

    /// Hours of the highest ranked active program, the day's best discharge
    /// opportunity. Empty when no program is active.
    pub fn top_program_hours(&self) -> Vec<Hour> {
        self.ranked
            .iter()
            .find_map(ProgramWindow::effective_hours)
            .map(|range| range.iter().collect())
            .unwrap_or_default()
    }

    /// 1 when an active program covers the hour.
    pub fn charging_mode(&self, hour: Hour) -> u8 {
        u8::from(!self.is_inactive(hour))
    }
}

/// Rank `programs` and attribute every hour to its winning program.
///
/// Fails only on priority tiers missing from the reward table.
pub fn prioritize(
    programs: &[ProgramWindow],
    settings: &OptimizerSettings,
) -> Result<ProgramSchedule, OptimizationError> {
    if let Some(unknown) = programs.iter().find(|p| settings.reward(p.priority).is_none()) {
        return Err(OptimizationError::invalid(format!(
            "program {} has unknown priority tier {}",
            unknown.name, unknown.priority
        )));
    }

    let ranked: Vec<ProgramWindow> = programs
        .iter()
        .sorted_by_key(|p| p.priority)
        .cloned()
        .collect();

    let mut winners = [None; HOURS_PER_DAY];
    for (index, program) in ranked.iter().enumerate() {
        let Some(range) = program.effective_hours() else {
            continue;
        };
        for hour in range.iter() {
            let winner = &mut winners[slot(hour)];
            if winner.is_none() {
                *winner = Some(index);
            }
        }
    }

    Ok(ProgramSchedule { ranked, winners })
}
