//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ForecastError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("worker task failed: {}", e))
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Forecast(ForecastError::ModelNotTrained) => StatusCode::CONFLICT,
            ServerError::Forecast(ForecastError::NoFoldsCompleted { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Forecast(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            ServerError::Forecast(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(detail = %self, "Internal server error");
            "An internal error occurred. Check server logs for details.".to_string()
        } else {
            tracing::debug!(detail = %self, status = status.as_u16(), "Request rejected");
            match &self {
                ServerError::BadRequest(msg) | ServerError::Conflict(msg) => msg.clone(),
                other => other.to_string(),
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
