#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
///
/// `Conflict` carries its message verbatim because it must name the existing
/// contact id; `Gateway` is reserved for local-store failures that happen
/// after the CRM leg already ran and therefore cannot be retried blindly.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("CRM error: {0}")]
    Crm(String),

    #[error("Bad gateway: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Attaches the per-call correlation id so the wire error can be traced
    /// across both the CRM and the local store.
    pub fn with_correlation(self, correlation_id: impl Into<String>) -> CorrelatedError {
        CorrelatedError {
            error: self,
            correlation_id: correlation_id.into(),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Crm(msg) => {
                tracing::error!("CRM error: {msg}");
                (StatusCode::BAD_GATEWAY, "CRM_ERROR", msg.clone())
            }
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {msg}");
                (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

/// An `AppError` paired with the correlation id of the request that raised it.
/// This is the error type handlers actually return.
#[derive(Debug)]
pub struct CorrelatedError {
    pub error: AppError,
    pub correlation_id: String,
}

impl IntoResponse for CorrelatedError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.error.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "correlation_id": self.correlation_id
            }
        }));

        (status, body).into_response()
    }
}

/// Postgres unique-violation check (SQLSTATE 23505). The email pre-check in
/// the service layer is inherently racy; the unique index is the backstop and
/// its violation must read as a conflict, not a generic failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

/// Maps a store error to `Conflict` when it is a unique violation, otherwise
/// passes it through as `Database`.
pub fn map_unique_violation(err: sqlx::Error, conflict_message: impl Into<String>) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(conflict_message.into())
    } else {
        AppError::Database(err)
    }
}
