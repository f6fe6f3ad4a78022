use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use stockcast_core::{
    run_forecast, ForecastError, ForecastRecord, StockRecord, DEFAULT_HORIZON_DAYS,
};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/forecast", post(forecast))
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    stock_data: Vec<StockRecord>,
    #[serde(default)]
    days: Option<u32>,
}

impl ForecastRequest {
    /// Missing or zero `days` means the default horizon.
    fn horizon_days(&self) -> u32 {
        self.days
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_HORIZON_DAYS)
    }
}

/// POST /api/forecast: Fit the configured model and project `days` ahead.
async fn forecast(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Json<Vec<ForecastRecord>>, ApiError> {
    let Json(request) = body?;
    if request.stock_data.is_empty() {
        return Err(ForecastError::EmptyInput.into());
    }

    let days = request.horizon_days();
    let rows = request.stock_data.len();
    let forecaster = Arc::clone(&state.forecaster);
    let points = tokio::task::spawn_blocking(move || {
        run_forecast(forecaster.as_ref(), &request.stock_data, days)
    })
    .await
    .map_err(|error| ApiError::Internal(format!("Forecasting failed: {error}")))??;

    tracing::info!(rows, days, points = points.len(), "forecast complete");
    Ok(Json(points))
}
