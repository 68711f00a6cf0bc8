// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for `/tasks/*` routes.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the scheduler's shared secret.
pub const TASKS_TOKEN_HEADER: &str = "x-tasks-token";

/// Require `X-Tasks-Token` to match the configured secret.
///
/// With no secret configured every task request is refused.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.tasks_token.as_deref() else {
        tracing::warn!("Blocked tasks request: TASKS_TOKEN not configured");
        return Err(StatusCode::FORBIDDEN);
    };

    let presented = request
        .headers()
        .get(TASKS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    let Some(presented) = presented else {
        tracing::warn!("Blocked tasks request: missing token header");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if !tokens_match(presented, expected) {
        tracing::warn!("Blocked tasks request: token mismatch");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("secret", "secret"));
        assert!(!tokens_match("secret", "secreT"));
        assert!(!tokens_match("secret", "secret-longer"));
        assert!(!tokens_match("", "secret"));
    }
}
