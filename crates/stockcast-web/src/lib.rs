//! # Stockcast Web
//!
//! HTTP API over [`stockcast_core`]:
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /` | Greeting |
//! | `GET /api/health` | Liveness probe |
//! | `GET /api/stocks` | Historical records (`ticker`, `start_date`, `end_date`, `interval`) |
//! | `POST /api/forecast` | Forecast from `{stock_data, days}` |
//!
//! Errors are JSON objects of the form `{"detail": "..."}`.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use stockcast_core::CorsConfig;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub use error::{ApiError, ServerError};
pub use state::AppState;

/// Full application router with CORS applied.
pub fn app(state: Arc<AppState>, cors: &CorsConfig) -> Router {
    routes::api_router()
        .layer(cors_layer(cors))
        .with_state(state)
}

/// Builds the CORS layer from configuration.
///
/// `*` allows anything. Combined with credentials, wildcards mirror the
/// request instead, since browsers reject a literal `*` there.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let credentials = config.allow_credentials;

    let origins = if is_wildcard(&config.allow_origins) {
        if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        AllowOrigin::list(parse_all(&config.allow_origins, "origin", |value| {
            HeaderValue::from_str(value).ok()
        }))
    };

    let methods = if is_wildcard(&config.allow_methods) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::any()
        }
    } else {
        AllowMethods::list(parse_all(&config.allow_methods, "method", |value| {
            Method::from_bytes(value.to_ascii_uppercase().as_bytes()).ok()
        }))
    };

    let headers = if is_wildcard(&config.allow_headers) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::any()
        }
    } else {
        AllowHeaders::list(parse_all(&config.allow_headers, "header", |value| {
            HeaderName::from_bytes(value.as_bytes()).ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(credentials)
        .max_age(config.max_age)
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|value| value == "*")
}

fn parse_all<T>(values: &[String], what: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| {
            let parsed = parse(value);
            if parsed.is_none() {
                tracing::warn!(value = %value, kind = what, "ignoring invalid CORS entry");
            }
            parsed
        })
        .collect()
}
