//! Error types for Rapport
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Every rejected operation leaves stored state unchanged, so each
/// variant maps to a single response with no partial side effects.
#[derive(Debug, Error)]
pub enum AppError {
    /// Target account does not exist (404)
    #[error("Account not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Session signature did not verify (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Realtime event names an account other than the authenticated one (403)
    #[error("Event sender does not match the authenticated account")]
    SenderMismatch,

    /// Target is private and the caller is not an approved follower (403)
    #[error("This account is private. Follow them to send a message")]
    PrivateAccount,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller tried to follow themselves (400)
    #[error("You cannot follow yourself")]
    SelfFollow,

    /// Message text was blank after trimming (400)
    #[error("Message text cannot be empty")]
    EmptyMessage,

    /// Approved edge already exists (409)
    #[error("Already following this account")]
    AlreadyFollowing,

    /// Pending edge already exists (409)
    #[error("Follow request already sent")]
    RequestAlreadySent,

    /// Accept was called without a pending request (409)
    #[error("No pending follow request from this account")]
    NoPendingRequest,

    /// Capacity exhausted (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Machine-readable error code, also used as the metric label
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidSignature => "invalid_signature",
            AppError::SenderMismatch => "sender_mismatch",
            AppError::PrivateAccount => "private_account",
            AppError::Validation(_) => "validation",
            AppError::SelfFollow => "self_follow",
            AppError::EmptyMessage => "empty_message",
            AppError::AlreadyFollowing => "already_following",
            AppError::RequestAlreadySent => "request_already_sent",
            AppError::NoPendingRequest => "no_pending_request",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::SenderMismatch | AppError::PrivateAccount => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::SelfFollow | AppError::EmptyMessage => {
                StatusCode::BAD_REQUEST
            }
            AppError::AlreadyFollowing
            | AppError::RequestAlreadySent
            | AppError::NoPendingRequest => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients
    ///
    /// Storage and internal failures are reported generically.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let error_type = self.code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = error_type, "Request failed");
        }

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": self.public_message(),
            "code": error_type,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
