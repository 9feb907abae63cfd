//! Canonical hourly series and raw row normalization

use crate::error::{ForecastError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

/// Date formats accepted for dataset rows, day-first notations before ISO
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Time formats accepted for range queries
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// A single row as it arrives from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Calendar date, day-first or ISO notation
    pub date: String,
    /// 1-based hour label, "01" is midnight
    pub hour: String,
    /// Observed demand for the hour
    pub demand: f64,
}

impl RawRecord {
    pub fn new(date: impl Into<String>, hour: impl Into<String>, demand: f64) -> Self {
        Self {
            date: date.into(),
            hour: hour.into(),
            demand,
        }
    }
}

/// What to do when two rows decode to the same timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateTimestamp`
    #[default]
    Reject,
    /// Keep the row that appears later in the input
    LastWriteWins,
}

/// Uniquely indexed, chronologically sorted hourly demand history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalSeries {
    points: BTreeMap<NaiveDateTime, f64>,
}

impl CanonicalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from already-decoded points. Later duplicates overwrite earlier ones.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        Self {
            points: points.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDateTime> {
        self.points.keys().next().copied()
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        self.points.keys().next_back().copied()
    }

    pub fn get(&self, timestamp: &NaiveDateTime) -> Option<f64> {
        self.points.get(timestamp).copied()
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        self.points.contains_key(timestamp)
    }

    /// Iterate points in ascending timestamp order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDateTime, f64)> + '_ {
        self.points.iter().map(|(ts, v)| (*ts, *v))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.points.keys().copied()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    /// Positional slice, clamped to the series length
    pub fn slice(&self, range: Range<usize>) -> CanonicalSeries {
        let start = range.start.min(self.len());
        let end = range.end.clamp(start, self.len());
        Self {
            points: self
                .points
                .iter()
                .skip(start)
                .take(end - start)
                .map(|(ts, v)| (*ts, *v))
                .collect(),
        }
    }

    /// Render the series back into raw rows, day-first dates and 1-based hour labels
    pub fn to_raw_records(&self) -> Vec<RawRecord> {
        self.iter()
            .map(|(ts, demand)| {
                RawRecord::new(
                    ts.date().format("%d/%m/%Y").to_string(),
                    encode_hour(ts.hour()),
                    demand,
                )
            })
            .collect()
    }
}

/// Turns raw rows into a canonical series
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesNormalizer {
    duplicate_policy: DuplicatePolicy,
}

impl TimeSeriesNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duplicate timestamp policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn normalize(&self, rows: &[RawRecord]) -> Result<CanonicalSeries> {
        let mut points = BTreeMap::new();
        let mut overwritten = 0usize;

        for row in rows {
            let timestamp = decode_timestamp(&row.date, &row.hour)?;
            if points.insert(timestamp, row.demand).is_some() {
                match self.duplicate_policy {
                    DuplicatePolicy::Reject => {
                        return Err(ForecastError::DuplicateTimestamp(timestamp));
                    }
                    DuplicatePolicy::LastWriteWins => overwritten += 1,
                }
            }
        }

        debug!(rows = rows.len(), unique = points.len(), overwritten, "Normalized raw rows");
        Ok(CanonicalSeries { points })
    }
}

/// Decode a 1-based hour label into a 0-based hour of day
pub fn decode_hour(label: &str) -> Result<u32> {
    let padded = format!("{:0>2}", label.trim());
    if padded == "01" {
        return Ok(0);
    }

    let value: u32 = padded.parse().map_err(|_| ForecastError::InvalidHour {
        label: label.to_string(),
    })?;

    if !(1..=24).contains(&value) {
        return Err(ForecastError::InvalidHour {
            label: label.to_string(),
        });
    }

    Ok(value - 1)
}

/// Inverse of [`decode_hour`]
pub fn encode_hour(hour: u32) -> String {
    format!("{:02}", hour + 1)
}

/// Parse a calendar date in day-first or ISO notation
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ForecastError::InvalidDate(value.to_string()))
}

/// Combine a date and an hour label into a timestamp on the hour
pub fn decode_timestamp(date: &str, hour_label: &str) -> Result<NaiveDateTime> {
    let hour = decode_hour(hour_label)?;
    let date = parse_date(date)?;
    let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| ForecastError::InvalidHour {
        label: hour_label.to_string(),
    })?;
    Ok(date.and_time(time))
}

/// Parse a query date and clock time ("2026-11-20", "06:00")
pub fn parse_datetime(date: &str, time: &str) -> Result<NaiveDateTime> {
    let date = parse_date(date)?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time.trim(), fmt).ok())
        .ok_or_else(|| ForecastError::InvalidDateTime(time.to_string()))?;
    Ok(date.and_time(time))
}

/// Parse a combined "date time" string, e.g. "2026-11-20 00:00:00"
pub fn parse_datetime_str(value: &str) -> Result<NaiveDateTime> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), None) => parse_datetime(date, time),
        (Some(date), None, None) => parse_datetime(date, "00:00"),
        _ => Err(ForecastError::InvalidDateTime(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_day_rows() -> Vec<RawRecord> {
        let mut rows = Vec::new();
        for date in ["20/11/2026", "21/11/2026"] {
            for label in 1..=24u32 {
                rows.push(RawRecord::new(date, format!("{:02}", label), label as f64 - 1.0));
            }
        }
        rows
    }

    #[test]
    fn test_decode_hour_range() {
        assert_eq!(decode_hour("01").unwrap(), 0);
        assert_eq!(decode_hour("02").unwrap(), 1);
        assert_eq!(decode_hour("24").unwrap(), 23);

        let mut previous = None;
        for label in 1..=24u32 {
            let hour = decode_hour(&format!("{:02}", label)).unwrap();
            assert!(hour <= 23);
            if let Some(prev) = previous {
                assert!(hour > prev);
            }
            previous = Some(hour);
        }
    }

    #[test]
    fn test_decode_hour_unpadded() {
        assert_eq!(decode_hour("1").unwrap(), 0);
        assert_eq!(decode_hour("9").unwrap(), 8);
    }

    #[test]
    fn test_decode_hour_rejects_out_of_range() {
        assert!(matches!(decode_hour("25"), Err(ForecastError::InvalidHour { .. })));
        assert!(matches!(decode_hour("00"), Err(ForecastError::InvalidHour { .. })));
        assert!(matches!(decode_hour("ab"), Err(ForecastError::InvalidHour { .. })));
    }

    #[test]
    fn test_parse_date_day_first() {
        let date = parse_date("20/11/2026").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        assert_eq!(parse_date("2026-11-20").unwrap(), date);
        assert!(matches!(parse_date("11/20/2026"), Err(ForecastError::InvalidDate(_))));
    }

    #[test]
    fn test_normalize_two_days() {
        let series = TimeSeriesNormalizer::new().normalize(&two_day_rows()).unwrap();
        assert_eq!(series.len(), 48);

        let first = series.first().unwrap();
        let last = series.last().unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 11, 21).unwrap().and_hms_opt(23, 0, 0).unwrap());

        let timestamps: Vec<_> = series.timestamps().collect();
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_normalize_sorts_unordered_input() {
        let mut rows = two_day_rows();
        rows.reverse();
        let series = TimeSeriesNormalizer::new().normalize(&rows).unwrap();
        assert_eq!(series.values()[0], 0.0);
        assert_eq!(series.values()[47], 23.0);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = TimeSeriesNormalizer::new();
        let series = normalizer.normalize(&two_day_rows()).unwrap();
        let again = normalizer.normalize(&series.to_raw_records()).unwrap();
        assert_eq!(series, again);
    }

    #[test]
    fn test_duplicate_policy() {
        let rows = vec![
            RawRecord::new("20/11/2026", "01", 1.0),
            RawRecord::new("20/11/2026", "01", 2.0),
        ];

        let rejected = TimeSeriesNormalizer::new().normalize(&rows);
        assert!(matches!(rejected, Err(ForecastError::DuplicateTimestamp(_))));

        let series = TimeSeriesNormalizer::new()
            .with_duplicate_policy(DuplicatePolicy::LastWriteWins)
            .normalize(&rows)
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.values(), vec![2.0]);
    }

    #[test]
    fn test_slice_is_positional() {
        let series = TimeSeriesNormalizer::new().normalize(&two_day_rows()).unwrap();
        let slice = series.slice(24..30);
        assert_eq!(slice.len(), 6);
        assert_eq!(slice.values(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(series.slice(40..100).len() == 8);
    }

    #[test]
    fn test_parse_datetime() {
        let ts = parse_datetime("2026-11-20", "06:00").unwrap();
        assert_eq!(ts, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap().and_hms_opt(6, 0, 0).unwrap());
        assert_eq!(parse_datetime_str("2026-11-20 06:00:00").unwrap(), ts);
        assert!(parse_datetime("2026-11-20", "6pm").is_err());
    }
}
