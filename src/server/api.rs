//! API route definitions

use std::sync::Arc;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Use POST /api/predict or GET /api/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed. Check the API documentation for supported methods.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/predict", post(handlers::predict))
        .route("/train", post(handlers::train))
        .route("/model", get(handlers::model_info))
        .route("/health", get(handlers::health_check))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    // CORS configured via CORS_ORIGIN env var (default: allow all)
    let cors = match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<axum::http::HeaderValue>() {
            Ok(origin) => CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any),
            Err(_) => {
                tracing::warn!(origin = %origin, "Invalid CORS_ORIGIN, allowing all origins");
                CorsLayer::permissive()
            }
        },
        _ => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
