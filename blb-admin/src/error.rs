//! Error types for blb-admin
//!
//! Handlers return [`ApiResult`]; domain errors from `blb_common` convert via
//! `?` and are mapped to status codes by their stable error code.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blb_common::api::ErrorResponse;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No actor identity on a request that requires one (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Actor identity not on the allow-list (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// blb-common error
    #[error(transparent)]
    Common(#[from] blb_common::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
            ApiError::Common(err) => {
                let status = match err {
                    blb_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    blb_common::Error::Validation(_) => StatusCode::BAD_REQUEST,
                    blb_common::Error::ReferentialIntegrity(_)
                    | blb_common::Error::DuplicateKey(_) => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };

                // Store failures surface as a generic message; the detail goes to the log
                let message = match err {
                    blb_common::Error::Database(_) => "Store operation failed".to_string(),
                    blb_common::Error::NotFound(msg)
                    | blb_common::Error::Validation(msg)
                    | blb_common::Error::ReferentialIntegrity(msg)
                    | blb_common::Error::DuplicateKey(msg) => msg.clone(),
                    other => other.to_string(),
                };

                (status, err.code(), message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(code = code, error = %self, "Request failed");
        } else {
            tracing::debug!(code = code, error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
