use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockcast_core::{HistoryRequest, Interval};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stocks", get(stocks))
}

#[derive(Debug, Deserialize)]
struct StocksQuery {
    ticker: String,
    start_date: String,
    end_date: String,
    interval: Option<String>,
}

/// GET /api/stocks: Historical records for a ticker and date range.
///
/// Dates are `YYYY-MM-DD` read as UTC midnight. An empty result is answered
/// with `204 No Content`.
async fn stocks(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StocksQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let interval = match query.interval.as_deref() {
        Some(token) => token.parse::<Interval>()?,
        None => Interval::default(),
    };
    let request =
        HistoryRequest::from_dates(&query.ticker, &query.start_date, &query.end_date, interval)?;

    let response = state.history.lookup(&request).await?;
    tracing::info!(
        symbol = %request.symbol,
        interval = %request.interval,
        rows = response.records.len(),
        served_from = ?response.served_from,
        "served history"
    );

    if response.records.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(response.records).into_response())
}
