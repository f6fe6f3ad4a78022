use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
}

/// GET /: Greeting.
async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

/// GET /api/health: Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
