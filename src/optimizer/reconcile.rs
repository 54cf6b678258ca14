//! Turning a solved plan into the persisted day schedule.
//!
//! Hours that have already started keep the values persisted by an earlier
//! run; the rest come from the fresh plan. A persisted record that cannot be
//! trusted is ignored and the whole day is rewritten.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::DispatchPlan;
use crate::domain::{hours, BatteryId, DailySchedule, Hour, HourlyLoad, ScheduleRow, HOURS_PER_DAY};

/// Reasons a persisted day record is not usable for freezing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconciliationConflict {
    #[error("persisted record has {0} rows, expected {HOURS_PER_DAY}")]
    RowCount(usize),

    #[error("persisted row {position} holds hour {hour}")]
    HourOrder { position: usize, hour: Hour },

    #[error("persisted row for hour {0} has non-finite values")]
    NonFinite(Hour),

    #[error("persisted record belongs to battery {battery_id} on {date}")]
    WrongDay { battery_id: BatteryId, date: NaiveDate },
}

/// Run metadata needed to stamp the reconciled record.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext {
    /// Local date the schedule covers.
    pub date: NaiveDate,
    /// Current local clock hour (0..=23) when `date` is today, `None` otherwise.
    pub clock_hour: Option<u32>,
    /// Reserve added to the optimized SOC for display.
    pub soc_reserve: f64,
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
}

impl ReconcileContext {
    /// Number of leading 1-based hours that are frozen. The hour in progress
    /// counts as elapsed.
    pub fn frozen_hours(&self) -> usize {
        self.clock_hour
            .map(|h| (h as usize + 1).min(HOURS_PER_DAY))
            .unwrap_or(0)
    }
}

/// Output of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub schedule: DailySchedule,
    /// Hours copied from the persisted record.
    pub frozen_hours: usize,
    /// Set when a persisted record existed but was ignored.
    pub conflict: Option<ReconciliationConflict>,
}

/// Round to 4 decimals, the stored precision of power and SOC.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Check a persisted record before trusting its past hours.
pub fn check_previous(
    previous: &DailySchedule,
    battery_id: BatteryId,
    date: NaiveDate,
) -> Result<(), ReconciliationConflict> {
    if previous.battery_id != battery_id || previous.date != date {
        return Err(ReconciliationConflict::WrongDay {
            battery_id: previous.battery_id,
            date: previous.date,
        });
    }
    if previous.rows.len() != HOURS_PER_DAY {
        return Err(ReconciliationConflict::RowCount(previous.rows.len()));
    }
    for (position, (row, expected)) in previous.rows.iter().zip(hours()).enumerate() {
        if row.hour != expected {
            return Err(ReconciliationConflict::HourOrder {
                position,
                hour: row.hour,
            });
        }
        if !row.is_finite() {
            return Err(ReconciliationConflict::NonFinite(row.hour));
        }
    }
    Ok(())
}

/// Build the 24-row schedule for `ctx.date` from `plan`, freezing elapsed
/// hours against `previous`.
pub fn reconcile(
    plan: &DispatchPlan,
    load: &HourlyLoad,
    previous: Option<&DailySchedule>,
    ctx: ReconcileContext,
) -> Reconciled {
    let mut conflict = None;
    let previous = previous.filter(|p| match check_previous(p, plan.battery_id, ctx.date) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                battery_id = plan.battery_id,
                date = %ctx.date,
                error = %e,
                "ignoring malformed persisted schedule"
            );
            conflict = Some(e);
            false
        }
    });

    let frozen = if previous.is_some() {
        ctx.frozen_hours()
    } else {
        0
    };

    let rows: Vec<ScheduleRow> = plan
        .hours
        .iter()
        .enumerate()
        .map(|(i, solved)| match previous {
            Some(record) if i < frozen => record.rows[i].clone(),
            _ => {
                let power = round4((solved.charge_power + solved.discharge_power).abs());
                ScheduleRow {
                    hour: solved.hour,
                    charging_status: solved.charging_status,
                    charging_mode: solved.charging_mode,
                    power,
                    soc: round4(solved.soc),
                    display_soc: round4(solved.soc + ctx.soc_reserve),
                    utility_power: solved.charging_status.sign() * power + load.at(solved.hour),
                }
            }
        })
        .collect();

    debug!(
        battery_id = plan.battery_id,
        date = %ctx.date,
        frozen_hours = frozen,
        "schedule reconciled"
    );

    Reconciled {
        schedule: DailySchedule {
            battery_id: plan.battery_id,
            date: ctx.date,
            run_id: ctx.run_id,
            updated_at: ctx.now,
            rows,
        },
        frozen_hours: frozen,
        conflict,
    }
}
