//! Model training module
//!
//! Provides the regression side of forecasting:
//! - The `Regressor` capability and evaluation metrics
//! - A gradient boosted tree regressor with native missing-value routing
//! - The trained model state kept by the forecast engine

mod models;
mod trained;
pub mod xgboost;

pub use models::{mae, rmse, EvalSet, RegressionMetrics, Regressor};
pub use trained::TrainedModel;
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
