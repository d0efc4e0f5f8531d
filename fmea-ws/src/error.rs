//! Error types for fmea-ws

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fmea_common::FailureClass;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Store busy or unreachable (503); retry later
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// fmea-common error, mapped by its failure class
    #[error(transparent)]
    Common(#[from] fmea_common::Error),
}

impl ApiError {
    /// Error for a failure class reported by the orchestrator
    pub fn from_class(class: FailureClass, message: String) -> Self {
        match class {
            FailureClass::MalformedInput => ApiError::BadRequest(message),
            FailureClass::NotFound => ApiError::NotFound(message),
            FailureClass::TransientStore => ApiError::Unavailable(message),
            FailureClass::Internal => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "MALFORMED_INPUT", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT_STORE_FAILURE", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => {
                return ApiError::from_class(err.class(), err.to_string()).into_response()
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
