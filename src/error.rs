// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
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

    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Twitch re-authentication required")]
    TwitchReauthRequired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("Twitch API error: {0}")]
    TwitchApi(String),

    #[error("TTS provider error: {0}")]
    TtsProvider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when Twitch rejects a token (expired, revoked, or bad refresh).
    pub const TWITCH_TOKEN_ERROR: &'static str = "Twitch token rejected";

    /// Whether this error means the user's Twitch credentials are unusable.
    pub fn is_twitch_token_error(&self) -> bool {
        match self {
            AppError::TwitchReauthRequired => true,
            AppError::TwitchApi(msg) => {
                msg == Self::TWITCH_TOKEN_ERROR
                    || msg.contains("invalid_grant")
                    || msg.contains("Invalid refresh token")
                    || msg.contains("Invalid OAuth token")
            }
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<&str> = field_errors.keys().map(|k| &**k).collect();
        fields.sort_unstable();
        AppError::BadRequest(format!("Invalid value for: {}", fields.join(", ")))
    }
}

/// JSON error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    needs_re_auth: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::TwitchReauthRequired => (StatusCode::UNAUTHORIZED, "twitch_reauth_required"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotConfigured(_) => (StatusCode::NOT_IMPLEMENTED, "not_configured"),
            AppError::TwitchApi(_) => (StatusCode::BAD_GATEWAY, "twitch_error"),
            AppError::TtsProvider(_) => (StatusCode::BAD_GATEWAY, "tts_error"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        // Client-facing text; storage and internal details stay in the logs.
        let error = match &self {
            AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::NotConfigured(msg)
            | AppError::TwitchApi(msg)
            | AppError::TtsProvider(msg) => msg.clone(),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                "Database error".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error,
            code,
            needs_re_auth: matches!(self, AppError::TwitchReauthRequired).then_some(true),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
