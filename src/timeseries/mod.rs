//! Time series module
//!
//! Provides the forecasting core's data preparation:
//! - Raw row normalization into a canonical hourly series
//! - Calendar and lag feature derivation
//! - Forward-chaining validation with a train/test gap

mod features;
mod series;
mod validation;

pub use features::{
    design_matrix, feature_names, future_rows, targets, training_rows, Feature, FeatureDeriver,
    FeatureRow, LagPolicy, DEFAULT_LAG_OFFSETS_DAYS, FEATURES,
};
pub use series::{
    decode_hour, decode_timestamp, encode_hour, parse_date, parse_datetime, parse_datetime_str,
    CanonicalSeries, DuplicatePolicy, RawRecord, TimeSeriesNormalizer,
};
pub use validation::{plan_folds, Fold, SplitConfig, SplitValidator, ValidationReport};
