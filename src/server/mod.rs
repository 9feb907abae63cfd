//! Demand forecast server module
//!
//! REST API over a shared forecast engine: range prediction, retraining and
//! model status.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{PredictRequest, TrainRequest};
pub use state::AppState;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ForecastConfig;
use crate::forecast::ForecastEngine;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Bootstrap the engine and serve the API until ctrl+c
pub async fn run_server(config: ForecastConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        dataset = %config.dataset_path.display(),
        model = %config.model_path.display(),
        started_at = %start_time.to_rfc3339(),
        "Preparing forecast engine"
    );

    let bootstrap_config = config.clone();
    let engine = tokio::task::spawn_blocking(move || ForecastEngine::bootstrap(&bootstrap_config)).await??;
    serve(config, engine).await
}

/// Serve the API over an already prepared engine
pub async fn serve(config: ForecastConfig, engine: ForecastEngine) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let model_loaded = engine.is_trained();

    let state = Arc::new(AppState::new(config, engine));
    let app = create_router(state);

    info!(
        address = %addr,
        model_loaded,
        started_at = %start_time.to_rfc3339(),
        "Demand forecast server starting"
    );
    info!(url = %format!("http://{}/api", addr), "REST API available");
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    info!("Server started successfully (press ctrl+c to stop)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
