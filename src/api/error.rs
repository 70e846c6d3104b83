//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::pipeline::derivation::DerivationError;
use crate::pipeline::import::ImportError;
use crate::pipeline::processor::ProcessingError;
use crate::pipeline::publish::PublishError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Upstream error: {0}")]
    BadGateway(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail),
            ApiError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, "TRACKER_UNAUTHORIZED", detail)
            }
            ApiError::BadGateway(detail) => {
                tracing::warn!(detail, "Upstream call failed");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILED", detail)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => {
                ApiError::NotFound(format!("{entity_type} not found"))
            }
            e @ DatabaseError::StatusConflict { .. } => ApiError::Conflict(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => e.into(),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DerivationError> for ApiError {
    fn from(err: DerivationError) -> Self {
        match err {
            DerivationError::Database(e) => e.into(),
            e @ DerivationError::EmptyContent(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            e @ (ImportError::EmptyFile | ImportError::FileTooLarge { .. }) => {
                ApiError::BadRequest(e.to_string())
            }
            ImportError::Database(e) => e.into(),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Import(e) => e.into(),
            ProcessingError::Database(e) => e.into(),
            ProcessingError::Derivation(e) => e.into(),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            e @ (PublishError::AlreadyRunning(_) | PublishError::NotRetryable(_)) => {
                ApiError::Conflict(e.to_string())
            }
            PublishError::Unauthorized(message) => ApiError::Unauthorized(message),
            PublishError::Database(e) => e.into(),
            e => ApiError::BadGateway(e.to_string()),
        }
    }
}
