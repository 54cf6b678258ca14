use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::{BatteryId, DailySchedule};

/// Persisted day schedules, one record per battery and day.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn find(&self, battery_id: BatteryId, date: NaiveDate) -> Result<Option<DailySchedule>>;

    /// Replace the whole day record in one step.
    async fn upsert(&self, schedule: DailySchedule) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySchedules {
    rows: RwLock<HashMap<(BatteryId, NaiveDate), DailySchedule>>,
}

#[async_trait]
impl ScheduleRepository for InMemorySchedules {
    async fn find(&self, battery_id: BatteryId, date: NaiveDate) -> Result<Option<DailySchedule>> {
        Ok(self.rows.read().get(&(battery_id, date)).cloned())
    }

    async fn upsert(&self, schedule: DailySchedule) -> Result<()> {
        self.rows
            .write()
            .insert((schedule.battery_id, schedule.date), schedule);
        Ok(())
    }
}
