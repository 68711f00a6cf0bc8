// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Protected API routes for the front-end.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{HistoryDay, Provider};
use crate::services::{AggregationResult, ConnectionStatus};
use crate::AppState;

const DEFAULT_HISTORY_DAYS: u32 = 7;
const MAX_HISTORY_DAYS: u32 = 30;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/connect/{provider}", get(connect))
        .route("/api/aggregate", post(aggregate))
        .route("/api/history", get(history))
        .route("/api/status", get(status))
}

// ─── Connect ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ConnectResponse {
    pub provider: Provider,
    pub authorization_url: String,
}

/// Start the OAuth flow for a provider and hand back the URL to open.
async fn connect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(provider): Path<String>,
) -> Result<Json<ConnectResponse>> {
    let provider: Provider = provider.parse()?;
    state.users.ensure_user(user.user_id).await?;

    let authorization_url = state
        .credentials
        .begin_authorization(user.user_id, provider)
        .await?;

    Ok(Json(ConnectResponse {
        provider,
        authorization_url,
    }))
}

// ─── Aggregate ───────────────────────────────────────────────

/// Fetch, score and store today's metrics for the caller.
async fn aggregate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AggregationResult>> {
    state.users.ensure_user(user.user_id).await?;
    let result = state.engine.aggregate(user.user_id).await?;
    Ok(Json(result))
}

// ─── History ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    DEFAULT_HISTORY_DAYS
}

/// Past days (today excluded), newest first.
async fn history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryDay>>> {
    if !(1..=MAX_HISTORY_DAYS).contains(&params.days) {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_HISTORY_DAYS
        )));
    }

    state.users.ensure_user(user.user_id).await?;
    let rows = state.metrics.read_history(user.user_id, params.days).await?;
    Ok(Json(rows))
}

// ─── Status ──────────────────────────────────────────────────

async fn status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ConnectionStatus>>> {
    state.users.ensure_user(user.user_id).await?;
    let statuses = state.credentials.connection_status(user.user_id).await?;
    Ok(Json(statuses))
}
