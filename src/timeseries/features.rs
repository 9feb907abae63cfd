//! Calendar and lag feature derivation for hourly demand

use super::series::CanonicalSeries;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default lag offsets in days: one, two and three years back on the same weekday
pub const DEFAULT_LAG_OFFSETS_DAYS: [i64; 3] = [364, 728, 1092];

/// Feature columns the regressor is trained on, in column order
pub const FEATURES: [Feature; 9] = [
    Feature::DayOfYear,
    Feature::Hour,
    Feature::DayOfWeek,
    Feature::Quarter,
    Feature::Month,
    Feature::Year,
    Feature::Lag1,
    Feature::Lag2,
    Feature::Lag3,
];

/// A numeric column of a [`FeatureRow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Hour,
    DayOfWeek,
    Quarter,
    Month,
    Year,
    DayOfYear,
    DayOfMonth,
    WeekOfYear,
    Lag1,
    Lag2,
    Lag3,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Hour => "hour",
            Feature::DayOfWeek => "dayofweek",
            Feature::Quarter => "quarter",
            Feature::Month => "month",
            Feature::Year => "year",
            Feature::DayOfYear => "dayofyear",
            Feature::DayOfMonth => "dayofmonth",
            Feature::WeekOfYear => "weekofyear",
            Feature::Lag1 => "lag1",
            Feature::Lag2 => "lag2",
            Feature::Lag3 => "lag3",
        }
    }

    pub fn is_lag(&self) -> bool {
        matches!(self, Feature::Lag1 | Feature::Lag2 | Feature::Lag3)
    }
}

/// How training rows with missing lags are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LagPolicy {
    /// Drop rows missing any lag
    #[default]
    Require,
    /// Keep rows; missing lags reach the regressor as NaN
    PassThrough,
}

/// Features derived for a single timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Quarter (1-4)
    pub quarter: u32,
    /// Month (1-12)
    pub month: u32,
    pub year: i32,
    /// Day of year (1-366)
    pub day_of_year: u32,
    /// Day of month (1-31)
    pub day_of_month: u32,
    /// ISO week number (1-53)
    pub week_of_year: u32,
    pub lag1: Option<f64>,
    pub lag2: Option<f64>,
    pub lag3: Option<f64>,
    /// Observed demand, absent for future rows
    pub demand: Option<f64>,
    pub is_future: bool,
}

impl FeatureRow {
    /// Calendar fields only; lags and demand unset
    pub fn calendar(timestamp: NaiveDateTime) -> Self {
        let month = timestamp.month();
        Self {
            timestamp,
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            quarter: (month - 1) / 3 + 1,
            month,
            year: timestamp.year(),
            day_of_year: timestamp.ordinal(),
            day_of_month: timestamp.day(),
            week_of_year: timestamp.iso_week().week(),
            lag1: None,
            lag2: None,
            lag3: None,
            demand: None,
            is_future: false,
        }
    }

    /// Value of a feature column, `None` when the lag is missing
    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Hour => Some(self.hour as f64),
            Feature::DayOfWeek => Some(self.day_of_week as f64),
            Feature::Quarter => Some(self.quarter as f64),
            Feature::Month => Some(self.month as f64),
            Feature::Year => Some(self.year as f64),
            Feature::DayOfYear => Some(self.day_of_year as f64),
            Feature::DayOfMonth => Some(self.day_of_month as f64),
            Feature::WeekOfYear => Some(self.week_of_year as f64),
            Feature::Lag1 => self.lag1,
            Feature::Lag2 => self.lag2,
            Feature::Lag3 => self.lag3,
        }
    }

    pub fn has_all_lags(&self) -> bool {
        self.lag1.is_some() && self.lag2.is_some() && self.lag3.is_some()
    }

    /// Whether the row can be used as a training sample
    pub fn is_trainable(&self, policy: LagPolicy) -> bool {
        if self.is_future || self.demand.is_none() {
            return false;
        }
        match policy {
            LagPolicy::Require => self.has_all_lags(),
            LagPolicy::PassThrough => true,
        }
    }
}

/// Derives feature rows from a canonical series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDeriver {
    lag_offsets_days: [i64; 3],
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_LAG_OFFSETS_DAYS)
    }
}

impl FeatureDeriver {
    pub fn new(lag_offsets_days: [i64; 3]) -> Self {
        Self { lag_offsets_days }
    }

    pub fn lag_offsets_days(&self) -> [i64; 3] {
        self.lag_offsets_days
    }

    /// Derive rows for every historical timestamp plus any future placeholders.
    ///
    /// Future timestamps are merged into the index without demand and tagged
    /// `is_future`. A future timestamp that is also historical becomes a future
    /// row. Lags always resolve against the historical values.
    pub fn derive(
        &self,
        series: &CanonicalSeries,
        extra_future: Option<&BTreeSet<NaiveDateTime>>,
    ) -> BTreeMap<NaiveDateTime, FeatureRow> {
        let mut rows = BTreeMap::new();

        for (timestamp, demand) in series.iter() {
            let mut row = self.row_with_lags(timestamp, series);
            row.demand = Some(demand);
            rows.insert(timestamp, row);
        }

        if let Some(future) = extra_future {
            for &timestamp in future {
                let mut row = self.row_with_lags(timestamp, series);
                row.is_future = true;
                rows.insert(timestamp, row);
            }
        }

        rows
    }

    /// Derive rows for `rows` with lag lookups restricted to `history`
    pub fn derive_against(
        &self,
        history: &CanonicalSeries,
        rows: &CanonicalSeries,
    ) -> BTreeMap<NaiveDateTime, FeatureRow> {
        rows.iter()
            .map(|(timestamp, demand)| {
                let mut row = self.row_with_lags(timestamp, history);
                row.demand = Some(demand);
                (timestamp, row)
            })
            .collect()
    }

    fn row_with_lags(&self, timestamp: NaiveDateTime, lookup: &CanonicalSeries) -> FeatureRow {
        let mut row = FeatureRow::calendar(timestamp);
        let [l1, l2, l3] = self.lag_offsets_days;
        row.lag1 = lookup.get(&(timestamp - Duration::days(l1)));
        row.lag2 = lookup.get(&(timestamp - Duration::days(l2)));
        row.lag3 = lookup.get(&(timestamp - Duration::days(l3)));
        row
    }
}

/// Rows usable for fitting, in chronological order
pub fn training_rows(rows: &BTreeMap<NaiveDateTime, FeatureRow>, policy: LagPolicy) -> Vec<FeatureRow> {
    rows.values()
        .filter(|row| row.is_trainable(policy))
        .cloned()
        .collect()
}

/// Future rows in chronological order, missing lags kept
pub fn future_rows(rows: &BTreeMap<NaiveDateTime, FeatureRow>) -> Vec<FeatureRow> {
    rows.values().filter(|row| row.is_future).cloned().collect()
}

/// Build the design matrix; missing values become NaN
pub fn design_matrix(rows: &[FeatureRow], features: &[Feature]) -> Array2<f64> {
    let mut x = Array2::from_elem((rows.len(), features.len()), f64::NAN);
    for (i, row) in rows.iter().enumerate() {
        for (j, feature) in features.iter().enumerate() {
            if let Some(value) = row.value(*feature) {
                x[[i, j]] = value;
            }
        }
    }
    x
}

/// Target vector; rows without demand contribute NaN
pub fn targets(rows: &[FeatureRow]) -> Array1<f64> {
    rows.iter().map(|row| row.demand.unwrap_or(f64::NAN)).collect()
}

pub fn feature_names(features: &[Feature]) -> Vec<String> {
    features.iter().map(|f| f.name().to_string()).collect()
}
