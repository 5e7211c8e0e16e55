//! HTTP error handling and conversion.
//!
//! Domain errors carry their own machine-readable codes and HTTP status
//! codes; this module only adds the transport-level cases and the JSON
//! response shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use peerrank_domain::errors::{AppError, ErrorResponse};
use thiserror::Error;
use tracing::error;

/// API-specific error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Domain or service error
    #[error(transparent)]
    Domain(#[from] AppError),

    /// Malformed request before it reached the services
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload failed shape validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Route-level not found
    #[error("Resource not found")]
    NotFound,

    /// Internal fault inside the adapter layer
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Domain(err) => StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Domain(err) => err.error_code(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "INVALID_PAYLOAD",
            Self::NotFound => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal faults are logged server-side and never leak detail.
        let message = match &self {
            Self::Internal(detail) => {
                error!(%detail, "internal error");
                "Internal server error".to_string()
            }
            Self::Domain(AppError::Internal(detail)) => {
                error!(%detail, "internal domain error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message,
            details: None,
            timestamp: chrono::Utc::now(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
