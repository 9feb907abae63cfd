//! Application state management

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::ForecastConfig;
use crate::export::ModelStore;
use crate::forecast::ForecastEngine;

/// Application state shared across handlers
pub struct AppState {
    pub config: ForecastConfig,
    /// Predictions take the read lock; a finished training run takes the
    /// write lock only to install its model
    pub engine: RwLock<ForecastEngine>,
    pub store: ModelStore,
    pub started_at: DateTime<Utc>,
    model_loaded: AtomicBool,
    training: AtomicBool,
}

impl AppState {
    pub fn new(config: ForecastConfig, engine: ForecastEngine) -> Self {
        let store = ModelStore::new(config.model_format);
        let engine = engine.with_max_forecast_hours(config.max_forecast_hours);
        let model_loaded = AtomicBool::new(engine.is_trained());
        Self {
            config,
            engine: RwLock::new(engine),
            store,
            started_at: Utc::now(),
            model_loaded,
            training: AtomicBool::new(false),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// Readable without touching the engine lock
    pub fn model_loaded(&self) -> bool {
        self.model_loaded.load(Ordering::Acquire)
    }

    pub fn set_model_loaded(&self) {
        self.model_loaded.store(true, Ordering::Release);
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    /// Claim the training slot; `None` while another run holds it
    pub fn begin_training(&self) -> Option<TrainingGuard<'_>> {
        self.training
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TrainingGuard { flag: &self.training })
    }
}

/// Releases the training slot when dropped
pub struct TrainingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
