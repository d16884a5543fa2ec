// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{message}")]
    Configuration {
        message: String,
        help: &'static str,
    },

    #[error("Google consent expired or was revoked")]
    ConsentExpired,

    #[error("Google API error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Remediation hint for missing Google credentials.
    pub const GOOGLE_CONFIG_HELP: &'static str =
        "Please set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET in your .env file";

    /// Remediation hint for missing database credentials.
    pub const DATABASE_CONFIG_HELP: &'static str =
        "Please set DATABASE_URL or DB_HOST, DB_USER and DB_PASSWORD in your .env file";

    pub fn google_not_configured() -> Self {
        AppError::Configuration {
            message: "Google OAuth is not configured".to_string(),
            help: Self::GOOGLE_CONFIG_HELP,
        }
    }

    pub fn database_not_configured() -> Self {
        AppError::Configuration {
            message: "Database is not configured".to_string(),
            help: Self::DATABASE_CONFIG_HELP,
        }
    }

    /// Coarse error code carried on the OAuth callback redirect.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "user_not_found",
            AppError::Database(_) => "database_error",
            AppError::ConsentExpired => "consent_expired",
            _ => "auth_failed",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict("Phone number already registered".to_string());
            }
        }
        AppError::Database(err.to_string())
    }
}

/// Unparseable or mistyped request bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut help = None;
        let (status, error, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::Configuration { message, help: h } => {
                tracing::error!(error = %message, "Configuration error");
                help = Some(*h);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "not_configured",
                    Some(message.clone()),
                )
            }
            AppError::ConsentExpired => (StatusCode::UNAUTHORIZED, "consent_expired", None),
            AppError::Provider(msg) => {
                tracing::error!(error = %msg, "Google API error");
                (StatusCode::BAD_GATEWAY, "provider_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            help,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
