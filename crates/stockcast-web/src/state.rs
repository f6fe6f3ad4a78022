use std::sync::Arc;

use stockcast_core::{AppConfig, Forecaster, HistoryService, LinearTrendForecaster};

/// Shared application state, passed to handlers via `axum::extract::State`.
pub struct AppState {
    pub history: HistoryService,
    pub forecaster: Arc<dyn Forecaster>,
}

impl AppState {
    pub fn new(history: HistoryService, forecaster: Arc<dyn Forecaster>) -> Arc<Self> {
        Arc::new(Self {
            history,
            forecaster,
        })
    }

    /// Production wiring: configured history service and the linear-trend model.
    pub fn from_config(config: &AppConfig) -> Arc<Self> {
        Self::new(
            config.history_service(),
            Arc::new(LinearTrendForecaster::default()),
        )
    }
}
