use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::{
    auth::AuthError,
    models::asset::MediaTypeError,
    repository::RepositoryError,
    services::probe::ProbeError,
    storage::StorageError,
};

/// Failure of any stage of the ingestion pipeline.
///
/// Every variant maps onto exactly one HTTP status in [`AppError`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),
    #[error("video `{0}` is owned by another user")]
    Forbidden(uuid::Uuid),
    #[error("video `{0}` not found")]
    NotFound(uuid::Uuid),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("probe failed: {0}")]
    ProbeFailed(#[from] ProbeError),
    #[error("object storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("video `{0}` was modified concurrently")]
    Conflict(uuid::Uuid),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<MediaTypeError> for IngestError {
    fn from(err: MediaTypeError) -> Self {
        IngestError::UnsupportedMediaType(err.to_string())
    }
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        IngestError::StorageUnavailable(err.to_string())
    }
}

impl From<RepositoryError> for IngestError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(id) => IngestError::Conflict(id),
            other => IngestError::StorageUnavailable(other.to_string()),
        }
    }
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            IngestError::Forbidden(_) => StatusCode::FORBIDDEN,
            IngestError::NotFound(_) => StatusCode::NOT_FOUND,
            IngestError::BadRequest(_) | IngestError::UnsupportedMediaType(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::ProbeFailed(_)
            | IngestError::StorageUnavailable(_)
            | IngestError::Conflict(_)
            | IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let status = err.status();
        // Server-side causes are logged, never echoed back.
        let message = match &err {
            IngestError::ProbeFailed(_) => "could not inspect the uploaded video".to_string(),
            IngestError::StorageUnavailable(_) => "storage is currently unavailable".to_string(),
            IngestError::Conflict(_) => {
                "video was modified concurrently, retry the upload".to_string()
            }
            IngestError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "ingest failed");
        } else {
            tracing::debug!(error = %err, status = status.as_u16(), "ingest rejected");
        }
        AppError::new(status, message)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound { .. } => AppError::not_found(err.to_string()),
            StorageError::InvalidObjectKey | StorageError::InvalidBucketName { .. } => {
                AppError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            other => {
                tracing::error!(error = %other, "asset read failed");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}
