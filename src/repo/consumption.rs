//! Hourly load per battery and day, split into the telemetry baseline and
//! manual overrides.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use strum::{Display, EnumString};

use crate::domain::{BatteryId, Hour};

pub type HourValues = BTreeMap<Hour, f64>;

/// Origin of stored load values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoadSource {
    /// Forecast derived from meter telemetry
    Baseline,
    /// Operator override, takes precedence per hour
    Manual,
}

#[async_trait]
pub trait ConsumptionRepository: Send + Sync {
    async fn values(&self, battery_id: BatteryId, date: NaiveDate, source: LoadSource) -> Result<HourValues>;

    /// Merge `values` into the stored hours.
    async fn upsert(
        &self,
        battery_id: BatteryId,
        date: NaiveDate,
        source: LoadSource,
        values: &HourValues,
    ) -> Result<()>;

    /// Drop every manual override of the day.
    async fn clear_manual(&self, battery_id: BatteryId, date: NaiveDate) -> Result<()>;

    /// Baseline with manual overrides applied.
    async fn effective(&self, battery_id: BatteryId, date: NaiveDate) -> Result<HourValues> {
        let baseline = self.values(battery_id, date, LoadSource::Baseline).await?;
        let manual = self.values(battery_id, date, LoadSource::Manual).await?;
        Ok(effective_load(&baseline, &manual))
    }
}

/// Overlay `manual` on `baseline`, hour by hour.
pub fn effective_load(baseline: &HourValues, manual: &HourValues) -> HourValues {
    let mut merged = baseline.clone();
    merged.extend(manual.iter().map(|(h, v)| (*h, *v)));
    merged
}

#[derive(Default)]
pub struct InMemoryConsumption {
    rows: RwLock<HashMap<(BatteryId, NaiveDate, LoadSource), HourValues>>,
}

#[async_trait]
impl ConsumptionRepository for InMemoryConsumption {
    async fn values(&self, battery_id: BatteryId, date: NaiveDate, source: LoadSource) -> Result<HourValues> {
        Ok(self
            .rows
            .read()
            .get(&(battery_id, date, source))
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert(
        &self,
        battery_id: BatteryId,
        date: NaiveDate,
        source: LoadSource,
        values: &HourValues,
    ) -> Result<()> {
        self.rows
            .write()
            .entry((battery_id, date, source))
            .or_default()
            .extend(values.iter().map(|(h, v)| (*h, *v)));
        Ok(())
    }

    async fn clear_manual(&self, battery_id: BatteryId, date: NaiveDate) -> Result<()> {
        self.rows.write().remove(&(battery_id, date, LoadSource::Manual));
        Ok(())
    }
}
