use serde::{Deserialize, Serialize};
use std::fmt;

use crate::optimizer::OptimizationError;

/// Number of hourly slots in one dispatch day.
pub const HOURS_PER_DAY: usize = 24;

/// Identifier of a battery (and of the facility component whose load it serves).
pub type BatteryId = u32;

/// 1-based hourly slot. Hour `h` covers the clock hour starting at `h - 1`.
pub type Hour = u8;

/// Iterate every hour of the day in order.
pub fn hours() -> impl Iterator<Item = Hour> + Clone {
    1..=HOURS_PER_DAY as Hour
}

/// Slot index (0-based) for an hour.
pub fn slot(hour: Hour) -> usize {
    usize::from(hour) - 1
}

/// Closed range of hours `start..=end` within 1..=24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHourRange", into = "RawHourRange")]
pub struct HourRange {
    start: Hour,
    end: Hour,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawHourRange {
    start: Hour,
    end: Hour,
}

impl HourRange {
    pub fn new(start: Hour, end: Hour) -> Result<Self, OptimizationError> {
        let max = HOURS_PER_DAY as Hour;
        if start == 0 || end == 0 || start > max || end > max {
            return Err(OptimizationError::invalid(format!(
                "hour range {start}..={end} is outside 1..={max}"
            )));
        }
        if start > end {
            return Err(OptimizationError::invalid(format!(
                "hour range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a range from clock hours (0..=23), as program activations report them.
    pub fn from_clock_hours(start: u8, end: u8) -> Result<Self, OptimizationError> {
        Self::new(start.saturating_add(1), end.saturating_add(1))
    }

    pub fn start(&self) -> Hour {
        self.start
    }

    pub fn end(&self) -> Hour {
        self.end
    }

    pub fn contains(&self, hour: Hour) -> bool {
        (self.start..=self.end).contains(&hour)
    }

    pub fn iter(&self) -> impl Iterator<Item = Hour> {
        self.start..=self.end
    }

    pub fn overlaps(&self, other: &HourRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl TryFrom<RawHourRange> for HourRange {
    type Error = OptimizationError;

    fn try_from(raw: RawHourRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl From<HourRange> for RawHourRange {
    fn from(range: HourRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

impl fmt::Display for HourRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_range_contains_bounds() {
        let range = HourRange::new(15, 16).unwrap();
        assert!(!range.contains(14));
        assert!(range.contains(15));
        assert!(range.contains(16));
        assert!(!range.contains(17));
        assert_eq!(range.iter().count(), 2);
    }

    #[rstest]
    #[case(0, 3)]
    #[case(5, 25)]
    #[case(10, 9)]
    fn test_invalid_ranges_are_rejected(#[case] start: Hour, #[case] end: Hour) {
        assert!(HourRange::new(start, end).is_err());
    }

    #[test]
    fn test_clock_hours_shift_to_slots() {
        let range = HourRange::from_clock_hours(14, 15).unwrap();
        assert_eq!((range.start(), range.end()), (15, 16));
    }

    #[test]
    fn test_overlap() {
        let a = HourRange::new(2, 10).unwrap();
        let b = HourRange::new(10, 12).unwrap();
        let c = HourRange::new(22, 24).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: HourRange = serde_json::from_str(r#"{"start":22,"end":24}"#).unwrap();
        assert_eq!(ok.end(), 24);
        assert!(serde_json::from_str::<HourRange>(r#"{"start":9,"end":3}"#).is_err());
    }
}
