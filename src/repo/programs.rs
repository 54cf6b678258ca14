use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::domain::{BatteryId, ProgramActivation};

/// Daily program activation signals.
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    async fn activations(&self, battery_id: BatteryId, date: NaiveDate) -> Result<Vec<ProgramActivation>>;

    /// Store `activation`, returning the one it replaced.
    async fn upsert(&self, activation: ProgramActivation) -> Result<Option<ProgramActivation>>;
}

#[derive(Default)]
pub struct InMemoryPrograms {
    rows: RwLock<BTreeMap<(BatteryId, NaiveDate, String), ProgramActivation>>,
}

#[async_trait]
impl ProgramRepository for InMemoryPrograms {
    async fn activations(&self, battery_id: BatteryId, date: NaiveDate) -> Result<Vec<ProgramActivation>> {
        Ok(self
            .rows
            .read()
            .range((battery_id, date, String::new())..)
            .take_while(|((b, d, _), _)| *b == battery_id && *d == date)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn upsert(&self, activation: ProgramActivation) -> Result<Option<ProgramActivation>> {
        let key = (activation.battery_id, activation.date, activation.program.clone());
        Ok(self.rows.write().insert(key, activation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activation(battery_id: BatteryId, program: &str, day: u32) -> ProgramActivation {
        ProgramActivation {
            battery_id,
            program: program.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
            status: true,
            start: Some(14),
            end: Some(15),
            is_manual: false,
        }
    }

    #[tokio::test]
    async fn test_activations_are_scoped_to_battery_and_day() {
        let repo = InMemoryPrograms::default();
        assert!(repo.upsert(activation(1, "GA", 1)).await.unwrap().is_none());
        repo.upsert(activation(1, "DR", 1)).await.unwrap();
        repo.upsert(activation(1, "GA", 2)).await.unwrap();
        repo.upsert(activation(2, "GA", 1)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let found = repo.activations(1, day).await.unwrap();
        let names: Vec<_> = found.iter().map(|a| a.program.as_str()).collect();
        assert_eq!(names, vec!["DR", "GA"]);
    }

    #[tokio::test]
    async fn test_upsert_returns_replaced() {
        let repo = InMemoryPrograms::default();
        repo.upsert(activation(1, "GA", 1)).await.unwrap();
        let mut update = activation(1, "GA", 1);
        update.status = false;
        let previous = repo.upsert(update).await.unwrap().unwrap();
        assert!(previous.status);
    }
}
