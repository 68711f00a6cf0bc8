// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth callback routes.
//!
//! The provider redirects the user's browser here, so every outcome is a
//! small HTML page rather than JSON.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Provider;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/callback/{provider}", get(oauth_callback))
}

/// Query parameters sent back by the provider.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

type Page = (StatusCode, Html<String>);

fn page(status: StatusCode, title: &str, message: &str) -> Page {
    let body = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{message}</p></body></html>\n"
    );
    (status, Html(body))
}

/// Complete an authorization started by `GET /api/connect/{provider}`.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Page {
    let provider: Provider = match provider.parse() {
        Ok(provider) => provider,
        Err(_) => {
            tracing::warn!(provider = %provider, "OAuth callback for unsupported provider");
            return page(
                StatusCode::BAD_REQUEST,
                "Authorization failed",
                "Unsupported provider.",
            );
        }
    };
    let name = provider.display_name();

    // The provider's error text is logged, never echoed back.
    if let Some(error) = params.error {
        tracing::warn!(provider = %provider, error = %error, "Provider returned an OAuth error");
        return page(
            StatusCode::BAD_REQUEST,
            "Authorization failed",
            &format!("{name} did not grant access. You can close this window and try again."),
        );
    }

    let Some(oauth_state) = params.state.filter(|s| !s.is_empty()) else {
        return page(
            StatusCode::BAD_REQUEST,
            "Authorization failed",
            "Missing state parameter.",
        );
    };

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return page(
            StatusCode::BAD_REQUEST,
            "Authorization failed",
            "Missing authorization code.",
        );
    };

    match state
        .credentials
        .complete_authorization_for(provider, &oauth_state, &code)
        .await
    {
        Ok(authorized) => {
            tracing::info!(
                user_id = authorized.user_id,
                provider = %provider,
                "Provider connected"
            );
            page(
                StatusCode::OK,
                &format!("{name} connected"),
                "Authorization complete. You can close this window.",
            )
        }
        Err(AppError::InvalidState) => page(
            StatusCode::BAD_REQUEST,
            "Authorization failed",
            "This authorization link is invalid or has already been used.",
        ),
        Err(AppError::TokenExchange { .. }) => page(
            StatusCode::BAD_GATEWAY,
            "Authorization failed",
            &format!("Could not complete authorization with {name}. Please try again."),
        ),
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "OAuth callback failed");
            page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authorization failed",
                "Something went wrong. Please try again later.",
            )
        }
    }
}
