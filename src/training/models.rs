//! Regressor capability and evaluation metrics

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A held-out set scored during fitting. The last one drives early stopping.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub x: &'a Array2<f64>,
    pub y: &'a Array1<f64>,
}

impl<'a> EvalSet<'a> {
    pub fn new(x: &'a Array2<f64>, y: &'a Array1<f64>) -> Self {
        Self { x, y }
    }
}

/// Pluggable regression model.
///
/// Inputs may contain NaN for missing lag values; implementations must route
/// them natively rather than fail or impute. The bounds allow a configured,
/// unfitted instance to be cloned per validation fold and persisted once trained.
pub trait Regressor: Clone + Send + Sync + Serialize + DeserializeOwned {
    /// Fit on `x`/`y`, scoring each of `eval_sets` as training progresses
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, eval_sets: &[EvalSet<'_>]) -> Result<()>;

    /// Predict one value per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Short model name for logs and metadata
    fn name(&self) -> &'static str;

    /// Feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Regression metrics for a set of predictions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
            n_samples: y_true.len(),
        })
    }
}

/// Root mean squared error
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute error
pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    Ok(y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64)
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(ForecastError::Shape {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(ForecastError::Data("cannot score an empty prediction set".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();
        assert!(metrics.r2 > 0.9);
        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_rmse_known_value() {
        let y_true = array![0.0, 0.0, 0.0, 0.0];
        let y_pred = array![2.0, -2.0, 2.0, -2.0];
        assert_eq!(rmse(&y_true, &y_pred).unwrap(), 2.0);
        assert_eq!(mae(&y_true, &y_pred).unwrap(), 2.0);
    }

    #[test]
    fn test_rmse_rejects_mismatch() {
        let y_true = array![1.0, 2.0];
        let y_pred = array![1.0];
        assert!(matches!(rmse(&y_true, &y_pred), Err(ForecastError::Shape { .. })));
        let empty = Array1::<f64>::zeros(0);
        assert!(rmse(&empty, &empty).is_err());
    }
}
