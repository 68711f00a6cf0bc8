// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vitals-Tracker: daily recovery and readiness from Whoop and Oura
//!
//! This crate connects user accounts to both wearable providers over
//! OAuth2, pulls each day's metrics, blends them into composite scores and
//! stores per-user daily snapshots.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{Database, UserStore};
use error::Result;
use services::{
    providers::http_client, AggregationEngine, CredentialManager, MetricsRepository, OuraClient,
    WhoopClient,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<CredentialManager>,
    pub engine: Arc<AggregationEngine>,
    pub metrics: MetricsRepository,
}

impl AppState {
    /// Wire every service against one storage backend.
    pub fn build<D: Database + 'static>(config: Config, db: Arc<D>) -> Result<Self> {
        let http = http_client(config.http_timeout_secs)?;

        let credentials = Arc::new(CredentialManager::new(&config, db.clone(), http.clone()));
        let metrics = MetricsRepository::new(db.clone());

        let whoop = WhoopClient::new(
            http.clone(),
            &config.whoop,
            credentials.clone(),
            config.fallback.clone(),
        );
        let oura = OuraClient::new(
            http,
            &config.oura,
            credentials.clone(),
            config.fallback.clone(),
        );
        let engine = AggregationEngine::new(
            Arc::new(whoop),
            Arc::new(oura),
            metrics.clone(),
            config.scoring.clone(),
        );

        Ok(Self {
            config,
            users: db,
            credentials,
            engine: Arc::new(engine),
            metrics,
        })
    }
}
