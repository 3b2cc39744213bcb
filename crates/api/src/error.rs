use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imperium_core::error::CoreError;
use imperium_core::session::SessionError;
use serde_json::json;

use crate::auth::jwt::TokenError;
use crate::signaling::SignalingError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain taxonomies and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `imperium_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A session coordination failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A rejected access or refresh token.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A host could not be reached outside of session coordination.
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Resolve the HTTP status, machine-readable code and client-facing message.
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Session coordination ---
            AppError::Session(err) => {
                let (status, code) = match err {
                    SessionError::HostNotFound(_)
                    | SessionError::ClientNotFound(_)
                    | SessionError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    SessionError::HostOwnershipMismatch(_)
                    | SessionError::ClientOwnershipMismatch(_)
                    | SessionError::SessionOwnershipMismatch(_) => {
                        (StatusCode::FORBIDDEN, "OWNERSHIP_MISMATCH")
                    }
                    SessionError::HostUnavailable(_) => (StatusCode::CONFLICT, "HOST_UNAVAILABLE"),
                    SessionError::HostBusy(_) => (StatusCode::CONFLICT, "HOST_BUSY"),
                    SessionError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
                    SessionError::AlreadyTerminal(_) => (StatusCode::CONFLICT, "ALREADY_TERMINAL"),
                    SessionError::SessionExpired(_) => (StatusCode::GONE, "SESSION_EXPIRED"),
                    SessionError::SessionStartFailed(_) => {
                        (StatusCode::BAD_GATEWAY, "SESSION_START_FAILED")
                    }
                };
                (status, code, err.to_string())
            }

            // --- Tokens ---
            AppError::Token(err) => {
                let code = match err {
                    TokenError::Expired => "TOKEN_EXPIRED",
                    TokenError::Malformed => "TOKEN_MALFORMED",
                    TokenError::Unsupported => "TOKEN_UNSUPPORTED",
                };
                (StatusCode::UNAUTHORIZED, code, err.to_string())
            }

            // --- Outbound host calls ---
            AppError::Signaling(err) => {
                tracing::warn!(error = %err, "Host request failed");
                (StatusCode::BAD_GATEWAY, "HOST_UNREACHABLE", err.to_string())
            }

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations (23505) map to 409 `CONFLICT`.
/// - Foreign-key, check and not-null violations (23503, 23514, 23502) map to
///   400 `DATA_INTEGRITY`.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            match db_err.code().as_deref() {
                Some("23505") => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                ),
                Some("23503") | Some("23514") | Some("23502") => (
                    StatusCode::BAD_REQUEST,
                    "DATA_INTEGRITY",
                    format!("Data integrity violation: {constraint}"),
                ),
                _ => {
                    tracing::error!(error = %db_err, "Database error");
                    internal()
                }
            }
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
