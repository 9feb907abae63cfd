//! Forecaster configuration
//!
//! Settings are resolved in layers: built-in defaults, then an optional JSON
//! file, then environment variables. Command-line flags are applied last by
//! the CLI.

use crate::error::{ForecastError, Result};
use crate::export::ModelFormat;
use crate::forecast::DEFAULT_MAX_FORECAST_HOURS;
use crate::server::ServerConfig;
use crate::timeseries::{DuplicatePolicy, SplitConfig, DEFAULT_LAG_OFFSETS_DAYS};
use crate::training::XGBoostConfig;
use crate::utils::DatasetSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Complete forecaster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Historical demand CSV
    pub dataset_path: PathBuf,
    pub schema: DatasetSchema,
    /// Where the trained model is loaded from and saved to
    pub model_path: PathBuf,
    pub model_format: ModelFormat,
    pub duplicate_policy: DuplicatePolicy,
    /// Lag distances in days for lag1, lag2, lag3
    pub lag_offsets_days: [i64; 3],
    pub split: SplitConfig,
    pub regressor: XGBoostConfig,
    /// Upper bound on the hours one prediction request may cover
    pub max_forecast_hours: usize,
    pub server: ServerConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/hourly_demand.csv"),
            schema: DatasetSchema::default(),
            model_path: PathBuf::from("models/demand_model.json"),
            model_format: ModelFormat::Json,
            duplicate_policy: DuplicatePolicy::Reject,
            lag_offsets_days: DEFAULT_LAG_OFFSETS_DAYS,
            split: SplitConfig::default(),
            regressor: XGBoostConfig::default(),
            max_forecast_hours: DEFAULT_MAX_FORECAST_HOURS,
            server: ServerConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ForecastError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ForecastError::Config(format!("invalid config {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// File (when given) or defaults, then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DATASET_PATH`, `MODEL_PATH`, `API_HOST`, `API_PORT`,
    /// `FORECAST_SPLITS`, `FORECAST_TEST_SIZE`, `FORECAST_GAP` and
    /// `FORECAST_MAX_HOURS`
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var("DATASET_PATH") {
            self.dataset_path = PathBuf::from(path);
        }
        if let Some(path) = var("MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(host) = var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("API_PORT") {
            self.server.port = parse_var("API_PORT", &port)?;
        }
        if let Some(splits) = var("FORECAST_SPLITS") {
            self.split.n_splits = parse_var("FORECAST_SPLITS", &splits)?;
        }
        if let Some(size) = var("FORECAST_TEST_SIZE") {
            self.split.test_size_hours = parse_var("FORECAST_TEST_SIZE", &size)?;
        }
        if let Some(gap) = var("FORECAST_GAP") {
            self.split.gap_hours = parse_var("FORECAST_GAP", &gap)?;
        }
        if let Some(hours) = var("FORECAST_MAX_HOURS") {
            self.max_forecast_hours = parse_var("FORECAST_MAX_HOURS", &hours)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        self.regressor.validate()?;
        if self.lag_offsets_days.iter().any(|d| *d <= 0) {
            return Err(ForecastError::Config("lag offsets must be positive day counts".to_string()));
        }
        if self.max_forecast_hours == 0 {
            return Err(ForecastError::Config("max_forecast_hours must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ForecastError::Config(format!("{} has an invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ForecastConfig::default();
        assert_eq!(config.split.n_splits, 5);
        assert_eq!(config.split.test_size_hours, 24 * 365);
        assert_eq!(config.split.gap_hours, 24);
        assert_eq!(config.lag_offsets_days, [364, 728, 1092]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MODEL_PATH", "/tmp/m.bin"),
            ("API_PORT", "9100"),
            ("FORECAST_SPLITS", "3"),
            ("FORECAST_GAP", "0"),
            ("FORECAST_MAX_HOURS", "168"),
        ]
        .into_iter()
        .collect();

        let mut config = ForecastConfig::default();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/tmp/m.bin"));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.split.n_splits, 3);
        assert_eq!(config.split.gap_hours, 0);
        assert_eq!(config.split.test_size_hours, 24 * 365);
        assert_eq!(config.max_forecast_hours, 168);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = ForecastConfig::default();
        let result = config.apply_vars(|k| (k == "FORECAST_SPLITS").then(|| "many".to_string()));
        assert!(matches!(result, Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.json");
        std::fs::write(
            &path,
            r#"{"dataset_path": "demand.csv", "split": {"n_splits": 2, "test_size_hours": 48, "gap_hours": 0}}"#,
        )
        .unwrap();

        let config = ForecastConfig::from_file(&path).unwrap();
        assert_eq!(config.dataset_path, PathBuf::from("demand.csv"));
        assert_eq!(config.split, SplitConfig::new(2, 48, 0));
        assert_eq!(config.regressor, XGBoostConfig::default());
    }

    #[test]
    fn test_invalid_lags_rejected() {
        let config = ForecastConfig {
            lag_offsets_days: [0, 7, 14],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_zero_forecast_cap_rejected() {
        let config = ForecastConfig {
            max_forecast_hours: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ForecastError::Config(_))));
    }
}
