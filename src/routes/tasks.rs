// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for the external scheduler.
//!
//! These endpoints are called on a timer, not directly by users, and are
//! guarded by the `X-Tasks-Token` shared secret.

use crate::error::Result;
use crate::middleware::require_tasks_auth;
use crate::services::BatchSummary;
use crate::AppState;
use axum::{extract::State, middleware, routing::post, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Task handler routes with their auth layer applied.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/aggregate-all", post(aggregate_all))
        .route("/tasks/purge-states", post(purge_states))
        .route_layer(middleware::from_fn_with_state(state, require_tasks_auth))
}

/// Aggregate today for every known user.
async fn aggregate_all(State(state): State<Arc<AppState>>) -> Result<Json<BatchSummary>> {
    let user_ids = state.users.list_user_ids().await?;
    tracing::info!(users = user_ids.len(), "Starting scheduled aggregation");

    let summary = state.engine.aggregate_many(&user_ids).await;

    tracing::info!(
        users = summary.users,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Scheduled aggregation finished"
    );
    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

/// Drop OAuth states that were never consumed.
async fn purge_states(State(state): State<Arc<AppState>>) -> Result<Json<PurgeResponse>> {
    let purged = state.credentials.purge_expired_states().await?;
    Ok(Json(PurgeResponse { purged }))
}
