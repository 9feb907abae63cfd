//! Error types for the demand forecaster

use chrono::NaiveDateTime;
use thiserror::Error;

/// Result type alias for forecasting operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the forecasting core and its collaborators
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid hour label '{label}': labels must be in 01..24")]
    InvalidHour { label: String },

    #[error("Invalid date '{0}': expected day-first (20/11/2026) or ISO (2026-11-20) notation")]
    InvalidDate(String),

    #[error("Invalid date/time '{0}'")]
    InvalidDateTime(String),

    #[error("Duplicate timestamp {0} in input rows")]
    DuplicateTimestamp(NaiveDateTime),

    #[error("No folds completed successfully ({attempted} attempted)")]
    NoFoldsCompleted { attempted: usize },

    #[error("Model not trained: train or load a model before predicting")]
    ModelNotTrained,

    #[error("Invalid range: end {end} precedes start {start}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Range too long: {requested} hours requested, at most {max} per forecast")]
    HorizonTooLong { requested: i64, max: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForecastError {
    /// Whether the error was caused by caller input rather than server state
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ForecastError::InvalidHour { .. }
                | ForecastError::InvalidDate(_)
                | ForecastError::InvalidDateTime(_)
                | ForecastError::DuplicateTimestamp(_)
                | ForecastError::InvalidRange { .. }
                | ForecastError::HorizonTooLong { .. }
                | ForecastError::Config(_)
        )
    }
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ForecastError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ForecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForecastError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForecastError::InvalidHour { label: "25".to_string() };
        assert_eq!(err.to_string(), "Invalid hour label '25': labels must be in 01..24");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForecastError = io_err.into();
        assert!(matches!(err, ForecastError::Io(_)));
    }

    #[test]
    fn test_user_error_classification() {
        assert!(ForecastError::InvalidDate("x".into()).is_user_error());
        assert!(ForecastError::HorizonTooLong { requested: 100, max: 10 }.is_user_error());
        assert!(!ForecastError::ModelNotTrained.is_user_error());
        assert!(!ForecastError::NoFoldsCompleted { attempted: 5 }.is_user_error());
    }
}
