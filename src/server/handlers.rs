//! HTTP request handlers

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::timeseries::{parse_datetime, LagPolicy, SplitConfig};
use crate::training::Regressor;

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Prediction
// ============================================================================

/// Forecast range; dates day-first or ISO, times "HH:MM" or "HH:MM:SS"
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>> {
    let Json(request) = payload?;
    let start = parse_datetime(&request.start_date, &request.start_time)?;
    let end = parse_datetime(&request.end_date, &request.end_time)?;

    let result = tokio::task::spawn_blocking(move || {
        let engine = state.engine.blocking_read();
        engine.predict_range(start, end)
    })
    .await??;

    Ok(Json(json!({ "result": result })))
}

// ============================================================================
// Training
// ============================================================================

/// Overrides for the configured split; every field is optional and an empty
/// body trains with the configured split
#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    pub n_splits: Option<usize>,
    pub test_size_hours: Option<usize>,
    pub gap_hours: Option<usize>,
    pub lag_policy: Option<LagPolicy>,
    /// Save the new model to the configured path (default true)
    pub persist: Option<bool>,
}

impl TrainRequest {
    fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("Invalid training request: {}", e)))
    }

    fn split_config(&self, base: &SplitConfig) -> SplitConfig {
        SplitConfig {
            n_splits: self.n_splits.unwrap_or(base.n_splits),
            test_size_hours: self.test_size_hours.unwrap_or(base.test_size_hours),
            gap_hours: self.gap_hours.unwrap_or(base.gap_hours),
            lag_policy: self.lag_policy.unwrap_or(base.lag_policy),
        }
    }
}

pub async fn train(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<serde_json::Value>> {
    let request = TrainRequest::from_body(&body)?;
    let split = request.split_config(&state.config.split);
    let persist = request.persist.unwrap_or(true);
    info!(?split, persist, "Training requested");

    let response = tokio::task::spawn_blocking(move || -> Result<serde_json::Value> {
        let Some(_slot) = state.begin_training() else {
            return Err(ServerError::Conflict("A training run is already in progress".to_string()));
        };

        // Predictions keep running on the current model while folds are fitted
        let model = state.engine.blocking_read().fit(&split)?;

        // Persist before installing so a failed save leaves the served model as it was
        let mut saved_to = None;
        if persist {
            state.store.save_to_path(&model, &state.config.model_path)?;
            saved_to = Some(state.config.model_path.display().to_string());
        }

        let scores = model.fold_scores.clone();
        let mean = model.mean_score();
        state.engine.blocking_write().set_model(model);
        state.set_model_loaded();

        Ok(json!({
            "success": true,
            "scores": scores,
            "mean_rmse": mean,
            "split": split,
            "saved_to": saved_to,
        }))
    })
    .await??;

    Ok(Json(response))
}

// ============================================================================
// Model & System
// ============================================================================

pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let engine = state.engine.read().await;
    let series = engine.series();
    let history = json!({
        "points": series.len(),
        "first": series.first(),
        "last": series.last(),
    });

    let Some(model) = engine.model() else {
        warn!("Model info requested before training");
        return Json(json!({
            "trained": false,
            "training": state.is_training(),
            "history": history,
        }));
    };

    Json(json!({
        "trained": true,
        "training": state.is_training(),
        "regressor": model.regressor.name(),
        "features": model.feature_names(),
        "lag_offsets_days": model.lag_offsets_days,
        "fold_scores": model.fold_scores,
        "mean_rmse": model.mean_score(),
        "trained_at": model.trained_at.to_rfc3339(),
        "history": history,
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.model_loaded(),
        "training": state.is_training(),
        "uptime_secs": state.uptime_secs(),
    }))
}
