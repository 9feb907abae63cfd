//! Trained model state held by the forecast engine

use super::models::Regressor;
use super::xgboost::XGBoostRegressor;
use crate::error::Result;
use crate::timeseries::{design_matrix, feature_names, Feature, FeatureDeriver, FeatureRow};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// A fitted regressor plus everything needed to rebuild its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel<R = XGBoostRegressor> {
    pub regressor: R,
    /// Feature columns in the order the regressor saw them
    pub features: Vec<Feature>,
    /// Lag offsets the features were derived with
    pub lag_offsets_days: [i64; 3],
    /// RMSE of every completed validation fold, oldest first
    pub fold_scores: Vec<f64>,
    pub trained_at: DateTime<Utc>,
}

impl<R: Regressor> TrainedModel<R> {
    pub fn new(regressor: R, features: Vec<Feature>, deriver: FeatureDeriver, fold_scores: Vec<f64>) -> Self {
        Self {
            regressor,
            features,
            lag_offsets_days: deriver.lag_offsets_days(),
            fold_scores,
            trained_at: Utc::now(),
        }
    }

    /// Deriver configured the way the training features were built
    pub fn deriver(&self) -> FeatureDeriver {
        FeatureDeriver::new(self.lag_offsets_days)
    }

    pub fn feature_names(&self) -> Vec<String> {
        feature_names(&self.features)
    }

    /// Predict demand for already-derived rows
    pub fn predict_rows(&self, rows: &[FeatureRow]) -> Result<Array1<f64>> {
        if rows.is_empty() {
            return Ok(Array1::zeros(0));
        }
        let x = design_matrix(rows, &self.features);
        self.regressor.predict(&x)
    }

    /// Mean RMSE across folds
    pub fn mean_score(&self) -> Option<f64> {
        if self.fold_scores.is_empty() {
            None
        } else {
            Some(self.fold_scores.iter().sum::<f64>() / self.fold_scores.len() as f64)
        }
    }
}
