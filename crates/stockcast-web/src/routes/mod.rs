mod forecast;
mod stocks;
mod system;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Assemble the API router: `/` plus everything under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(system::routes())
        .merge(stocks::routes())
        .merge(forecast::routes())
}
