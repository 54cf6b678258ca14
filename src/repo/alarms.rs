use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::domain::{BatteryId, ProgramActivation};

/// Operator handling of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlarmAction {
    /// Not handled yet
    #[default]
    Idle,
    Accept,
    Reject,
}

/// Raised when a program activation of the day changes after it was first
/// received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAlarm {
    pub id: Uuid,
    pub battery_id: BatteryId,
    pub program: String,
    pub date: NaiveDate,
    pub raised_at: DateTime<Utc>,
    pub message: String,
    pub previous: ProgramActivation,
    pub current: ProgramActivation,
    #[serde(default)]
    pub action: AlarmAction,
    pub cleared_at: Option<DateTime<Utc>>,
}

impl ProgramAlarm {
    pub fn is_open(&self) -> bool {
        self.action == AlarmAction::Idle
    }
}

#[async_trait]
pub trait AlarmRepository: Send + Sync {
    async fn raise(&self, alarm: ProgramAlarm) -> Result<()>;

    async fn list(&self, battery_id: BatteryId, date: NaiveDate) -> Result<Vec<ProgramAlarm>>;

    async fn find(&self, battery_id: BatteryId, alarm_id: Uuid) -> Result<Option<ProgramAlarm>>;

    /// Record the operator's action on an open alarm. Returns the updated
    /// alarm, `None` when the battery has no such alarm.
    async fn resolve(
        &self,
        battery_id: BatteryId,
        alarm_id: Uuid,
        action: AlarmAction,
        cleared_at: DateTime<Utc>,
    ) -> Result<Option<ProgramAlarm>>;
}

#[derive(Default)]
pub struct InMemoryAlarms {
    rows: RwLock<Vec<ProgramAlarm>>,
}

#[async_trait]
impl AlarmRepository for InMemoryAlarms {
    async fn raise(&self, alarm: ProgramAlarm) -> Result<()> {
        self.rows.write().push(alarm);
        Ok(())
    }

    async fn list(&self, battery_id: BatteryId, date: NaiveDate) -> Result<Vec<ProgramAlarm>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|a| a.battery_id == battery_id && a.date == date)
            .cloned()
            .collect())
    }

    async fn find(&self, battery_id: BatteryId, alarm_id: Uuid) -> Result<Option<ProgramAlarm>> {
        Ok(self
            .rows
            .read()
            .iter()
            .find(|a| a.battery_id == battery_id && a.id == alarm_id)
            .cloned())
    }

    async fn resolve(
        &self,
        battery_id: BatteryId,
        alarm_id: Uuid,
        action: AlarmAction,
        cleared_at: DateTime<Utc>,
    ) -> Result<Option<ProgramAlarm>> {
        let mut rows = self.rows.write();
        let Some(alarm) = rows
            .iter_mut()
            .find(|a| a.battery_id == battery_id && a.id == alarm_id)
        else {
            return Ok(None);
        };
        alarm.action = action;
        alarm.cleared_at = Some(cleared_at);
        Ok(Some(alarm.clone()))
    }
}
