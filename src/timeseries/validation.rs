//! Forward-chaining time series validation

use super::features::{design_matrix, targets, training_rows, FeatureDeriver, LagPolicy, FEATURES};
use super::series::CanonicalSeries;
use crate::error::{ForecastError, Result};
use crate::training::{rmse, EvalSet, Regressor, TrainedModel};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info, warn};

/// Fold layout for forward-chaining validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Number of folds
    pub n_splits: usize,
    /// Test window length in hourly samples
    pub test_size_hours: usize,
    /// Samples left out between train and test
    pub gap_hours: usize,
    /// Treatment of training rows with missing lags
    pub lag_policy: LagPolicy,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            test_size_hours: 24 * 365,
            gap_hours: 24,
            lag_policy: LagPolicy::Require,
        }
    }
}

impl SplitConfig {
    pub fn new(n_splits: usize, test_size_hours: usize, gap_hours: usize) -> Self {
        Self {
            n_splits,
            test_size_hours,
            gap_hours,
            ..Default::default()
        }
    }

    /// Set lag policy
    pub fn with_lag_policy(mut self, policy: LagPolicy) -> Self {
        self.lag_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_splits == 0 {
            return Err(ForecastError::Config("n_splits must be at least 1".to_string()));
        }
        if self.test_size_hours == 0 {
            return Err(ForecastError::Config("test_size_hours must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// One train/test partition over series positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Fold number, 0 is the oldest
    pub index: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Plan expanding-window folds whose test windows tile the end of the series.
///
/// Fold `i` tests on `[n - (n_splits - i) * test_size, +test_size)` and trains on
/// everything up to `gap` samples before that. Folds whose test window would
/// start before the first sample are left out.
pub fn plan_folds(n_samples: usize, config: &SplitConfig) -> Vec<Fold> {
    let mut folds = Vec::with_capacity(config.n_splits);

    for index in 0..config.n_splits {
        let span = (config.n_splits - index).checked_mul(config.test_size_hours);
        let Some(test_start) = span.and_then(|s| n_samples.checked_sub(s)) else {
            debug!(fold = index, n_samples, "Test window starts before the series, fold not planned");
            continue;
        };

        let test_end = test_start + config.test_size_hours;
        let train_end = test_start.saturating_sub(config.gap_hours);

        folds.push(Fold {
            index,
            train: 0..train_end,
            test: test_start..test_end,
        });
    }

    folds
}

/// Outcome of a validation run
#[derive(Debug, Clone)]
pub struct ValidationReport<R> {
    /// Regressor from the last completed fold
    pub model: TrainedModel<R>,
    /// RMSE per completed fold, oldest first
    pub scores: Vec<f64>,
    pub completed_folds: Vec<usize>,
    pub skipped_folds: Vec<usize>,
}

impl<R> ValidationReport<R> {
    pub fn mean_score(&self) -> f64 {
        self.scores.iter().sum::<f64>() / self.scores.len().max(1) as f64
    }
}

/// Runs forward-chaining validation and keeps the last fold's regressor
#[derive(Debug, Clone, Default)]
pub struct SplitValidator {
    config: SplitConfig,
    deriver: FeatureDeriver,
}

impl SplitValidator {
    pub fn new(config: SplitConfig) -> Self {
        Self {
            config,
            deriver: FeatureDeriver::default(),
        }
    }

    /// Use a deriver with custom lag offsets
    pub fn with_deriver(mut self, deriver: FeatureDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn folds(&self, n_samples: usize) -> Vec<Fold> {
        plan_folds(n_samples, &self.config)
    }

    /// Fit a clone of `prototype` on every fold and score it on the fold's test window.
    ///
    /// Test-window lags are looked up in the train window only, so test targets
    /// never feed their own features. Folds left empty after dropping incomplete
    /// rows are skipped. The returned model is the last completed fold's, even
    /// when an earlier fold scored better.
    pub fn validate<R: Regressor>(&self, series: &CanonicalSeries, prototype: &R) -> Result<ValidationReport<R>> {
        self.config.validate()?;

        let policy = self.config.lag_policy;
        let folds = self.folds(series.len());
        let mut scores = Vec::new();
        let mut completed_folds = Vec::new();
        let mut skipped_folds = Vec::new();
        let mut last_regressor = None;

        info!(
            n_samples = series.len(),
            planned = folds.len(),
            n_splits = self.config.n_splits,
            test_size = self.config.test_size_hours,
            gap = self.config.gap_hours,
            regressor = prototype.name(),
            "Starting forward-chaining validation"
        );

        for fold in &folds {
            let train_series = series.slice(fold.train.clone());
            let test_series = series.slice(fold.test.clone());

            let train = training_rows(&self.deriver.derive(&train_series, None), policy);
            let test = training_rows(&self.deriver.derive_against(&train_series, &test_series), policy);

            debug!(
                fold = fold.index,
                train_window = train_series.len(),
                test_window = test_series.len(),
                train_rows = train.len(),
                test_rows = test.len(),
                "Derived fold features"
            );

            if train.is_empty() || test.is_empty() {
                warn!(fold = fold.index, train_rows = train.len(), test_rows = test.len(), "No data after dropping missing values, skipping fold");
                skipped_folds.push(fold.index);
                continue;
            }

            let x_train = design_matrix(&train, &FEATURES);
            let y_train = targets(&train);
            let x_test = design_matrix(&test, &FEATURES);
            let y_test = targets(&test);

            let mut regressor = prototype.clone();
            regressor.fit(
                &x_train,
                &y_train,
                &[EvalSet::new(&x_train, &y_train), EvalSet::new(&x_test, &y_test)],
            )?;

            let preds = regressor.predict(&x_test)?;
            let score = rmse(&y_test, &preds)?;
            info!(fold = fold.index, rmse = score, train_rows = train.len(), test_rows = test.len(), "Fold completed");

            scores.push(score);
            completed_folds.push(fold.index);
            last_regressor = Some(regressor);
        }

        let Some(regressor) = last_regressor else {
            warn!(attempted = self.config.n_splits, "No folds completed successfully");
            return Err(ForecastError::NoFoldsCompleted {
                attempted: self.config.n_splits,
            });
        };

        let report = ValidationReport {
            model: TrainedModel::new(regressor, FEATURES.to_vec(), self.deriver, scores.clone()),
            scores,
            completed_folds,
            skipped_folds,
        };
        info!(mean_rmse = report.mean_score(), scores = ?report.scores, "Score across folds");

        Ok(report)
    }
}
