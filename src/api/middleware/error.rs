//! Unified API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::models::ErrorResponse;
use crate::error::EventsError;

/// API-specific error type.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters.
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Event store query failed.
    StoreError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            Self::StoreError(msg) => {
                error!(error = %msg, "Event store error in API handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    "Event query failed".to_string(),
                )
            }
            Self::InternalError(msg) => {
                error!(error = %msg, "Internal error in API handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        });

        (status, body).into_response()
    }
}

impl From<EventsError> for ApiError {
    fn from(err: EventsError) -> Self {
        match err {
            EventsError::ValidationError { message } => Self::BadRequest(message),
            EventsError::StoreError { .. } | EventsError::DecodingError { .. } => {
                Self::StoreError(err.to_string())
            }
            EventsError::ConfigError { .. } => Self::InternalError(err.to_string()),
        }
    }
}
