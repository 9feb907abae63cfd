//! Forecast engine implementation

use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::export::ModelStore;
use crate::timeseries::{
    future_rows, CanonicalSeries, DuplicatePolicy, FeatureDeriver, RawRecord, SplitConfig, SplitValidator,
    TimeSeriesNormalizer,
};
use crate::training::{Regressor, TrainedModel, XGBoostRegressor};
use crate::utils::DataLoader;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{info, warn};

/// One predicted hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub timestamp: NaiveDateTime,
    pub month: u32,
    pub year: i32,
    /// Hour of day (0-23)
    pub hour: u32,
    pub predicted_demand: f64,
}

/// Chronological predictions for a requested range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastResult {
    rows: Vec<ForecastRow>,
}

impl ForecastResult {
    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastRow> {
        self.rows.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.predicted_demand).collect()
    }

    pub fn into_rows(self) -> Vec<ForecastRow> {
        self.rows
    }
}

/// Longest range a single forecast may cover: two leap years of hours
pub const DEFAULT_MAX_FORECAST_HOURS: usize = 24 * 366 * 2;

/// Number of hourly steps from `start` to `end` inclusive
pub fn range_hours(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_hours() + 1
}

/// Hourly timestamps from `start` to `end` inclusive
pub fn hourly_range(start: NaiveDateTime, end: NaiveDateTime) -> BTreeSet<NaiveDateTime> {
    let mut timestamps = BTreeSet::new();
    let mut current = start;
    while current <= end {
        timestamps.insert(current);
        current += Duration::hours(1);
    }
    timestamps
}

/// Owns the demand history and the current model
#[derive(Debug, Clone)]
pub struct ForecastEngine<R: Regressor = XGBoostRegressor> {
    series: CanonicalSeries,
    prototype: R,
    deriver: FeatureDeriver,
    model: Option<TrainedModel<R>>,
    scores: Vec<f64>,
    max_forecast_hours: usize,
}

impl<R: Regressor> ForecastEngine<R> {
    /// Create an engine over a normalized series. `prototype` is cloned and
    /// fitted on every validation fold.
    pub fn new(series: CanonicalSeries, prototype: R) -> Self {
        Self {
            series,
            prototype,
            deriver: FeatureDeriver::default(),
            model: None,
            scores: Vec::new(),
            max_forecast_hours: DEFAULT_MAX_FORECAST_HOURS,
        }
    }

    /// Normalize raw rows and create an engine over them
    pub fn from_records(records: &[RawRecord], policy: DuplicatePolicy, prototype: R) -> Result<Self> {
        let series = TimeSeriesNormalizer::new().with_duplicate_policy(policy).normalize(records)?;
        info!(
            records = records.len(),
            points = series.len(),
            first = ?series.first(),
            last = ?series.last(),
            "Demand history normalized"
        );
        Ok(Self::new(series, prototype))
    }

    /// Use a deriver with custom lag offsets for training
    pub fn with_deriver(mut self, deriver: FeatureDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Cap the number of hours one `predict_range` call may cover
    pub fn with_max_forecast_hours(mut self, hours: usize) -> Self {
        self.max_forecast_hours = hours;
        self
    }

    pub fn max_forecast_hours(&self) -> usize {
        self.max_forecast_hours
    }

    /// Validate across folds and return the last fold's model without
    /// installing it
    pub fn fit(&self, config: &SplitConfig) -> Result<TrainedModel<R>> {
        let start = Instant::now();
        let validator = SplitValidator::new(config.clone()).with_deriver(self.deriver);

        let report = match validator.validate(&self.series, &self.prototype) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, kept_previous_model = self.model.is_some(), "Training failed");
                return Err(e);
            }
        };

        info!(
            completed = report.completed_folds.len(),
            skipped = report.skipped_folds.len(),
            mean_rmse = report.mean_score(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );
        Ok(report.model)
    }

    /// Validate across folds and keep the last fold's model.
    ///
    /// On failure the previous model and scores are left untouched.
    pub fn train(&mut self, config: &SplitConfig) -> Result<&[f64]> {
        let model = self.fit(config)?;
        self.set_model(model);
        Ok(&self.scores)
    }

    /// Predict demand for every hour from `start` to `end` inclusive.
    ///
    /// Requested hours are merged into the history as future rows, so their lag
    /// features resolve against observed demand exactly as during training.
    pub fn predict_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<ForecastResult> {
        let model = self.model.as_ref().ok_or(ForecastError::ModelNotTrained)?;
        if end < start {
            return Err(ForecastError::InvalidRange { start, end });
        }
        let requested = range_hours(start, end);
        if requested > self.max_forecast_hours as i64 {
            return Err(ForecastError::HorizonTooLong {
                requested,
                max: self.max_forecast_hours,
            });
        }

        let timestamps = hourly_range(start, end);
        let rows = model.deriver().derive(&self.series, Some(&timestamps));
        let future = future_rows(&rows);
        let predictions = model.predict_rows(&future)?;

        let rows = future
            .iter()
            .zip(predictions.iter())
            .map(|(row, &predicted_demand)| ForecastRow {
                timestamp: row.timestamp,
                month: row.timestamp.month(),
                year: row.timestamp.year(),
                hour: row.timestamp.hour(),
                predicted_demand,
            })
            .collect();

        info!(%start, %end, hours = timestamps.len(), "Range predicted");
        Ok(ForecastResult { rows })
    }

    pub fn model(&self) -> Option<&TrainedModel<R>> {
        self.model.as_ref()
    }

    /// Install a model, e.g. one loaded from disk
    pub fn set_model(&mut self, model: TrainedModel<R>) {
        self.scores = model.fold_scores.clone();
        self.model = Some(model);
    }

    pub fn series(&self) -> &CanonicalSeries {
        &self.series
    }

    /// RMSE per completed fold of the current model
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

impl ForecastEngine<XGBoostRegressor> {
    /// Load the dataset, then load the saved model or train and save a new one
    pub fn bootstrap(config: &ForecastConfig) -> Result<Self> {
        config.validate()?;

        let records = DataLoader::new(config.schema.clone()).load_records(&config.dataset_path)?;
        let mut engine = Self::from_records(
            &records,
            config.duplicate_policy,
            XGBoostRegressor::new(config.regressor.clone()),
        )?
        .with_deriver(FeatureDeriver::new(config.lag_offsets_days))
        .with_max_forecast_hours(config.max_forecast_hours);

        let store = ModelStore::new(config.model_format);
        if store.exists(&config.model_path) {
            let model = store.load_from_path(&config.model_path)?;
            engine.set_model(model);
            info!(path = %config.model_path.display(), "Using saved model");
        } else {
            info!(path = %config.model_path.display(), "No saved model, training a new one");
            engine.train(&config.split)?;
            if let Some(model) = engine.model() {
                store.save_to_path(model, &config.model_path)?;
            }
        }

        Ok(engine)
    }
}
