// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::Provider;
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

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Unknown or already consumed OAuth state. Never retried.
    #[error("Invalid or already used OAuth state")]
    InvalidState,

    #[error("{} token exchange failed: {details}", .provider.display_name())]
    TokenExchange { provider: Provider, details: String },

    /// Missing credential or provider rejected it; the user must re-authorize.
    #[error("{}: {message}", .provider.display_name())]
    ProviderAuth { provider: Provider, message: String },

    /// Transient provider or network failure.
    #[error("{} error: {message}", .provider.display_name())]
    ProviderFetch { provider: Provider, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether re-running the authorization flow is the way out.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            AppError::ProviderAuth { .. } | AppError::TokenExchange { .. }
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::UnsupportedProvider(p) => (
                StatusCode::BAD_REQUEST,
                "unsupported_provider",
                Some(p.clone()),
            ),
            AppError::InvalidState => {
                tracing::warn!("Rejected request with invalid OAuth state");
                (StatusCode::BAD_REQUEST, "invalid_state", None)
            }
            AppError::TokenExchange { .. } => (
                StatusCode::BAD_GATEWAY,
                "token_exchange_failed",
                Some(self.to_string()),
            ),
            AppError::ProviderAuth { .. } => (
                StatusCode::UNAUTHORIZED,
                "provider_authorization_required",
                Some(self.to_string()),
            ),
            AppError::ProviderFetch { .. } => {
                (StatusCode::BAD_GATEWAY, "provider_error", Some(self.to_string()))
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
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
