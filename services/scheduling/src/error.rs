//! Error taxonomy for the scheduling service
//!
//! Every failure a client can act on carries a stable reason `code` next to
//! the human-readable message so callers can branch on it.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::repositories::StoreError;

/// Custom error type for the scheduling service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Requested date is inside the advance-booking window
    #[error("Sessions must be booked at least {days} days in advance")]
    TooSoon { days: i64 },

    /// The user already holds the weekly maximum of active sessions
    #[error("Weekly limit of active sessions reached")]
    QuotaExceeded,

    /// Another active session holds the requested slot
    #[error("The requested slot is already booked")]
    SlotTaken,

    /// Session, mentor or instructor does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authenticated caller may not act on this session
    #[error("{0}")]
    Forbidden(String),

    /// Session state diverged from what the command requires
    #[error("{0}")]
    Conflict(String),

    /// Storage timed out or is unreachable; safe to retry
    #[error("Session storage is temporarily unavailable")]
    Unavailable,

    /// Missing or invalid bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Anything else; details are logged, never returned
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable reason code rendered as `code` in the body
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::TooSoon { .. } => "TooSoon",
            ApiError::QuotaExceeded => "QuotaExceeded",
            ApiError::SlotTaken => "SlotTaken",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Unavailable => "Unavailable",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::TooSoon { .. }
            | ApiError::QuotaExceeded
            | ApiError::SlotTaken => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken => ApiError::SlotTaken,
            StoreError::QuotaExceeded => ApiError::QuotaExceeded,
            StoreError::VersionConflict => ApiError::Conflict(
                "Session was modified concurrently; reload it and retry".to_string(),
            ),
            StoreError::NotFound => ApiError::NotFound("Session"),
            e if e.is_transient() => {
                error!("Session storage unavailable: {}", e);
                ApiError::Unavailable
            }
            StoreError::Database(sqlx::Error::PoolClosed) => {
                error!("Session storage pool is closed");
                ApiError::Unavailable
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!("Internal error: {}", detail);
        }

        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
