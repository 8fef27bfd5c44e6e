//! HTTP mapping for core errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ratecast_fx::FxError;
use serde::Serialize;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Core error on its way to an HTTP client.
#[derive(Debug)]
pub struct ApiError(pub FxError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FxError::CacheEmpty => StatusCode::SERVICE_UNAVAILABLE,
            FxError::RateUnavailable(_) => StatusCode::NOT_FOUND,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            // Provider failures never reach query paths; report them as upstream trouble.
            FxError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            err if err.is_retryable() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.0.error_code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
