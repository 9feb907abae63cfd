//! Forecasting module
//!
//! The engine owns the normalized demand history and the current model. It
//! trains through forward-chaining validation and predicts arbitrary hourly
//! ranges by re-deriving the training features for future timestamps.

mod engine;

pub use engine::{hourly_range, range_hours, ForecastEngine, ForecastResult, ForecastRow, DEFAULT_MAX_FORECAST_HOURS};
