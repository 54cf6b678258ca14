use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BatteryId, Hour, HOURS_PER_DAY};

/// Direction of battery power in one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum ChargingStatus {
    Discharging,
    Idle,
    Charging,
}

impl ChargingStatus {
    /// Classify solved powers; magnitudes at or below `epsilon` count as zero.
    pub fn classify(charge_power: f64, discharge_power: f64, epsilon: f64) -> Self {
        if charge_power > epsilon {
            Self::Charging
        } else if discharge_power > epsilon {
            Self::Discharging
        } else {
            Self::Idle
        }
    }

    pub fn sign(self) -> f64 {
        f64::from(i8::from(self))
    }
}

impl From<ChargingStatus> for i8 {
    fn from(status: ChargingStatus) -> Self {
        match status {
            ChargingStatus::Discharging => -1,
            ChargingStatus::Idle => 0,
            ChargingStatus::Charging => 1,
        }
    }
}

impl TryFrom<i8> for ChargingStatus {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Discharging),
            0 => Ok(Self::Idle),
            1 => Ok(Self::Charging),
            other => Err(format!("invalid charging status {other}")),
        }
    }
}

/// One persisted hour of a day's dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub hour: Hour,
    pub charging_status: ChargingStatus,
    /// 1 when an active program covers the hour
    pub charging_mode: u8,
    /// Battery power magnitude
    pub power: f64,
    /// State of charge as optimized
    pub soc: f64,
    /// `soc` plus the battery's reserve (`soc_min`), as shown to operators
    pub display_soc: f64,
    /// Power drawn from the utility after battery action
    pub utility_power: f64,
}

impl ScheduleRow {
    pub fn is_finite(&self) -> bool {
        [self.power, self.soc, self.display_soc, self.utility_power]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// The persisted dispatch of one battery for one local day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub battery_id: BatteryId,
    pub date: NaiveDate,
    /// Run that last wrote the record
    pub run_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub rows: Vec<ScheduleRow>,
}

impl DailySchedule {
    pub fn row(&self, hour: Hour) -> Option<&ScheduleRow> {
        self.rows.iter().find(|r| r.hour == hour)
    }

    /// SOC at the end of the day, the starting point of the next one.
    pub fn closing_soc(&self) -> Option<f64> {
        self.row(HOURS_PER_DAY as Hour).map(|r| r.soc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charging_status_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&ChargingStatus::Discharging).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&ChargingStatus::Charging).unwrap(), "1");
        let idle: ChargingStatus = serde_json::from_str("0").unwrap();
        assert_eq!(idle, ChargingStatus::Idle);
        assert!(serde_json::from_str::<ChargingStatus>("2").is_err());
    }

    #[test]
    fn test_classify_prefers_charge() {
        assert_eq!(ChargingStatus::classify(120.0, 0.0, 1e-6), ChargingStatus::Charging);
        assert_eq!(ChargingStatus::classify(0.0, 300.0, 1e-6), ChargingStatus::Discharging);
        assert_eq!(ChargingStatus::classify(1e-9, 1e-9, 1e-6), ChargingStatus::Idle);
        assert_eq!(ChargingStatus::Discharging.sign(), -1.0);
    }
}
