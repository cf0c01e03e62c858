//! Error types for Authgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! The OAuth callback never returns these as HTTP errors; its failure
//! policy is a redirect to the frontend with a status indicator. Error
//! responses here cover the session check and startup-time failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// No session cookie on a protected endpoint (401)
    #[error("unauthenticated")]
    Unauthenticated,

    /// Session cookie present but failed verification (401)
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Identity provider interaction failed (502)
    #[error("OIDC provider error: {0}")]
    Oidc(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

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

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, body, error_type) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "unauthenticated" }),
                "unauthenticated",
            ),
            AppError::InvalidToken(detail) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "invalid token", "detail": detail }),
                "invalid_token",
            ),
            AppError::Oidc(msg) => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({ "error": msg }),
                "oidc",
            ),
            AppError::HttpClient(_) => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({ "error": self.to_string() }),
                "http_client",
            ),
            AppError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
                "config",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "Internal server error" }),
                "internal",
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
