use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{hours, slot, Hour, HOURS_PER_DAY};
use crate::optimizer::OptimizationError;

/// Forecast facility demand for each hour of one day.
///
/// Construction guarantees all 24 hours are present with finite,
/// non-negative values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HourlyLoad {
    values: [f64; HOURS_PER_DAY],
}

impl HourlyLoad {
    /// Build from an hour → value map. An empty map is the retryable
    /// "no load data" failure.
    pub fn from_map(map: &BTreeMap<Hour, f64>) -> Result<Self, OptimizationError> {
        if map.is_empty() {
            return Err(OptimizationError::no_load_data());
        }
        Self::check_values(map)?;
        let mut values = [0.0; HOURS_PER_DAY];
        for hour in hours() {
            values[slot(hour)] = *map.get(&hour).ok_or_else(|| {
                OptimizationError::invalid(format!("load is missing hour {hour}"))
            })?;
        }
        Ok(Self { values })
    }

    /// Check the hours and values of a possibly partial update.
    pub fn check_values(map: &BTreeMap<Hour, f64>) -> Result<(), OptimizationError> {
        if let Some(extra) = map.keys().find(|h| **h == 0 || usize::from(**h) > HOURS_PER_DAY) {
            return Err(OptimizationError::invalid(format!(
                "load has out-of-range hour {extra}"
            )));
        }
        map.iter()
            .try_for_each(|(hour, value)| check_value(*hour, *value).map(drop))
    }

    /// Build from a series ordered by hour, starting at hour 1.
    pub fn from_series(series: &[f64]) -> Result<Self, OptimizationError> {
        if series.is_empty() {
            return Err(OptimizationError::no_load_data());
        }
        if series.len() != HOURS_PER_DAY {
            return Err(OptimizationError::invalid(format!(
                "load has {} hourly values, expected {HOURS_PER_DAY}",
                series.len()
            )));
        }
        let mut values = [0.0; HOURS_PER_DAY];
        for (i, value) in series.iter().enumerate() {
            values[i] = check_value((i + 1) as Hour, *value)?;
        }
        Ok(Self { values })
    }

    pub fn flat(value: f64) -> Result<Self, OptimizationError> {
        Self::from_series(&[value; HOURS_PER_DAY])
    }

    pub fn at(&self, hour: Hour) -> f64 {
        self.values[slot(hour)]
    }

    pub fn values(&self) -> &[f64; HOURS_PER_DAY] {
        &self.values
    }
}

fn check_value(hour: Hour, value: f64) -> Result<f64, OptimizationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(OptimizationError::invalid(format!(
            "load for hour {hour} must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

impl<'de> Deserialize<'de> for HourlyLoad {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let series = Vec::<f64>::deserialize(deserializer)?;
        Self::from_series(&series).map_err(serde::de::Error::custom)
    }
}
