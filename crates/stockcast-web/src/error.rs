use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use stockcast_core::{ConfigError, ForecastError, HistoryError, ValidationError};
use thiserror::Error;

/// Error returned by API handlers, rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), detail = %self, "request failed");
        }
        (status, axum::Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl From<HistoryError> for ApiError {
    fn from(error: HistoryError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<ForecastError> for ApiError {
    fn from(error: ForecastError) -> Self {
        match error {
            ForecastError::EmptyInput | ForecastError::HorizonTooLong { .. } => {
                Self::BadRequest(error.to_string())
            }
            ForecastError::Model(_) => Self::Internal(format!("Forecasting failed: {error}")),
        }
    }
}

/// Startup failures of the server binary.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_errors_map_to_client_or_server_status() {
        assert_eq!(
            ApiError::from(ForecastError::EmptyInput).status(),
            StatusCode::BAD_REQUEST
        );
        let model = ApiError::from(ForecastError::Model(String::from("singular matrix")));
        assert_eq!(model.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(model.to_string().starts_with("Forecasting failed: "));
    }
}
