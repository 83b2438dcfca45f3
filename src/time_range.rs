//! # Weekly Activity Windows
//!
//! Value types describing when the orchestrator is allowed to run its
//! background monitoring: a recurring weekly window (day-of-week span plus
//! time-of-day span) and a collection thereof. The logic here is pure and
//! deterministic; the supervisory scheduling job feeds it the current time.
//!
//! A day span may wrap the week boundary (start day greater than end day
//! means "from start day through the end of the week, then from the start of
//! the week through end day"). A time span may not cross midnight: such a
//! window must be expressed as two adjacent ranges.

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::constants::{MAXIMUM_DAY_INDEX, MINIMUM_DAY_INDEX};

/// Minutes since midnight for a `HH:MM` time string.
///
/// `24:00` is accepted as an end-of-day bound. Returns `None` for anything
/// that is not a valid time string.
fn parse_time_string(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;

    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;

    if minutes > 59 {
        return None;
    }

    if hours > 24 || (hours == 24 && minutes > 0) {
        return None;
    }

    Some(hours * 60 + minutes)
}

/// A recurring weekly activity window.
///
/// Days are ISO day-of-week indexes (1 = Monday through 7 = Sunday); times
/// are `HH:MM` strings. The serialized form uses the storage keys of the
/// application parameters (`dayfrom`, `dayto`, `timefrom`, `timeto`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(rename = "dayfrom")]
    pub start_day: u8,
    #[serde(rename = "dayto")]
    pub end_day: u8,
    #[serde(rename = "timefrom")]
    pub start_time: String,
    #[serde(rename = "timeto")]
    pub end_time: String,
}

impl TimeRange {
    pub fn new(start_day: u8, end_day: u8, start_time: &str, end_time: &str) -> Self {
        Self {
            start_day,
            end_day,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    /// Check that the day indexes and time strings are well-formed and that
    /// the end time is not strictly before the start time.
    pub fn is_valid(&self) -> bool {
        if self.start_day < MINIMUM_DAY_INDEX || self.start_day > MAXIMUM_DAY_INDEX {
            return false;
        }

        if self.end_day < MINIMUM_DAY_INDEX || self.end_day > MAXIMUM_DAY_INDEX {
            return false;
        }

        let (Some(start), Some(end)) = (
            parse_time_string(&self.start_time),
            parse_time_string(&self.end_time),
        ) else {
            return false;
        };

        // A window crossing midnight must be expressed as two ranges.
        end >= start
    }

    /// Check whether the given instant falls inside this window.
    pub fn is_in_range(&self, date_time: DateTime<Local>) -> bool {
        self.fits_day_range(date_time) && self.fits_time_range(date_time)
    }

    fn fits_day_range(&self, date_time: DateTime<Local>) -> bool {
        let day_of_week = date_time.weekday().number_from_monday() as u8;

        if self.start_day <= self.end_day {
            return day_of_week >= self.start_day && day_of_week <= self.end_day;
        }

        day_of_week >= self.start_day || day_of_week <= self.end_day
    }

    fn fits_time_range(&self, date_time: DateTime<Local>) -> bool {
        let minute_of_day = date_time.hour() * 60 + date_time.minute();

        match (
            parse_time_string(&self.start_time),
            parse_time_string(&self.end_time),
        ) {
            (Some(start), Some(end)) => minute_of_day >= start && minute_of_day <= end,
            _ => false,
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(MINIMUM_DAY_INDEX, MAXIMUM_DAY_INDEX, "00:00", "24:00")
    }
}

/// An ordered collection of activity windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeRangeCollection {
    ranges: Vec<TimeRange>,
}

impl TimeRangeCollection {
    pub fn new(ranges: Vec<TimeRange>) -> Self {
        Self { ranges }
    }

    /// Parse a collection from its persisted JSON array form.
    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }

    /// Serialize this collection to its persisted JSON array form.
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(&self.ranges) {
            Ok(json) => Some(json),
            Err(error) => {
                tracing::error!(%error, "Could not serialize the orchestrator time ranges to JSON");
                None
            }
        }
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn add_range(&mut self, range: TimeRange) {
        self.ranges.push(range);
    }

    /// Check whether the given instant falls inside any contained window.
    /// An empty collection never matches.
    pub fn is_in_ranges(&self, date_time: DateTime<Local>) -> bool {
        self.ranges.iter().any(|range| range.is_in_range(date_time))
    }

    /// A collection is valid if every contained range is.
    pub fn is_valid(&self) -> bool {
        self.ranges.iter().all(TimeRange::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// A local timestamp on the given ISO weekday at `hour:minute`.
    /// 2024-01-01 is a Monday, so day offsets map directly.
    fn local_on(weekday: u8, hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, weekday as u32, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_range_within_week_matches_inner_days() {
        let range = TimeRange::new(2, 4, "08:00", "18:00");

        assert!(range.is_in_range(local_on(2, 8, 0)));
        assert!(range.is_in_range(local_on(3, 12, 30)));
        assert!(range.is_in_range(local_on(4, 18, 0)));
        assert!(!range.is_in_range(local_on(1, 12, 0)));
        assert!(!range.is_in_range(local_on(5, 12, 0)));
        assert!(!range.is_in_range(local_on(3, 18, 1)));
        assert!(!range.is_in_range(local_on(3, 7, 59)));
    }

    #[test]
    fn test_range_wrapping_week_boundary() {
        // Friday through Monday, any time of day.
        let range = TimeRange::new(5, 1, "00:00", "23:59");

        assert!(range.is_in_range(local_on(5, 10, 0)));
        assert!(range.is_in_range(local_on(6, 10, 0)));
        assert!(range.is_in_range(local_on(7, 10, 0)));
        assert!(range.is_in_range(local_on(1, 10, 0)));
        assert!(!range.is_in_range(local_on(3, 10, 0)));
    }

    #[test]
    fn test_midnight_crossing_time_span_is_invalid() {
        let range = TimeRange::new(1, 1, "18:00", "08:00");
        assert!(!range.is_valid());
    }

    #[test]
    fn test_validity_bounds() {
        assert!(TimeRange::new(1, 7, "00:00", "24:00").is_valid());
        assert!(TimeRange::new(5, 1, "06:30", "06:30").is_valid());
        assert!(!TimeRange::new(0, 7, "00:00", "24:00").is_valid());
        assert!(!TimeRange::new(1, 8, "00:00", "24:00").is_valid());
        assert!(!TimeRange::new(1, 7, "0:00", "24:00").is_valid());
        assert!(!TimeRange::new(1, 7, "00:00", "24:01").is_valid());
        assert!(!TimeRange::new(1, 7, "00:60", "24:00").is_valid());
        assert!(!TimeRange::new(1, 7, "midnight", "24:00").is_valid());
    }

    #[test]
    fn test_empty_collection_never_matches_but_is_valid() {
        let collection = TimeRangeCollection::default();
        assert!(!collection.is_in_ranges(local_on(3, 12, 0)));
        assert!(collection.is_valid());
    }

    #[test]
    fn test_collection_matches_any_range() {
        let collection = TimeRangeCollection::new(vec![
            TimeRange::new(1, 1, "08:00", "12:00"),
            TimeRange::new(4, 5, "14:00", "16:00"),
        ]);

        assert!(collection.is_in_ranges(local_on(1, 9, 0)));
        assert!(collection.is_in_ranges(local_on(5, 15, 0)));
        assert!(!collection.is_in_ranges(local_on(1, 13, 0)));
        assert!(!collection.is_in_ranges(local_on(3, 15, 0)));
    }

    #[test]
    fn test_collection_invalid_if_any_range_invalid() {
        let collection = TimeRangeCollection::new(vec![
            TimeRange::new(1, 5, "08:00", "18:00"),
            TimeRange::new(1, 1, "18:00", "08:00"),
        ]);
        assert!(!collection.is_valid());
    }

    #[test]
    fn test_json_round_trip_uses_storage_keys() {
        let collection =
            TimeRangeCollection::new(vec![TimeRange::new(1, 5, "07:30", "18:00")]);
        let json = collection.to_json().unwrap();
        assert!(json.contains("\"dayfrom\":1"));
        assert!(json.contains("\"timeto\":\"18:00\""));

        let parsed = TimeRangeCollection::from_json(&json).unwrap();
        assert_eq!(parsed, collection);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(TimeRangeCollection::from_json("not json").is_none());
        assert_eq!(
            TimeRangeCollection::from_json("[]").unwrap(),
            TimeRangeCollection::default()
        );
    }
}
