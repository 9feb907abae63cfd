//! Demand Forecast - Hourly electricity demand forecasting
//!
//! This crate turns historical hourly demand records into a forecaster:
//! - Normalization of raw date/hour rows into a canonical hourly series
//! - Calendar and year-over-year lag features
//! - Forward-chaining validation of a gradient boosted tree regressor
//! - Range forecasts over arbitrary future hours
//! - Web server and CLI interfaces
//!
//! # Modules
//!
//! ## Forecasting Core
//! - [`timeseries`] - Series normalization, feature derivation, fold validation
//! - [`training`] - Regressor capability and the boosted tree implementation
//! - [`forecast`] - Engine owning the history and current model
//!
//! ## Persistence & Data
//! - [`export`] - Checksummed model artifacts (bincode or JSON)
//! - [`utils`] - Dataset loading
//! - [`config`] - Layered configuration
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Forecasting core
pub mod timeseries;
pub mod training;
pub mod forecast;

// Persistence & data
pub mod export;
pub mod utils;
pub mod config;

// Services
pub mod server;
pub mod cli;

pub use error::{ForecastError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ForecastError, Result};

    // Time series
    pub use crate::timeseries::{
        CanonicalSeries, DuplicatePolicy, Feature, FeatureDeriver, FeatureRow, LagPolicy, RawRecord, SplitConfig,
        SplitValidator, TimeSeriesNormalizer, FEATURES,
    };

    // Training
    pub use crate::training::{EvalSet, Regressor, TrainedModel, XGBoostConfig, XGBoostRegressor};

    // Forecasting
    pub use crate::forecast::{ForecastEngine, ForecastResult, ForecastRow};

    // Persistence & data
    pub use crate::config::ForecastConfig;
    pub use crate::export::{ModelFormat, ModelStore};
    pub use crate::utils::{DataLoader, DatasetSchema};
}
