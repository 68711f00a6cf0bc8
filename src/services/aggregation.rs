// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily aggregation pipeline.
//!
//! Fetch both providers concurrently, score the day, then persist. A
//! provider failing (fully or partly) is recorded in the result's error
//! list and never stops the pipeline. Storage failures are returned.

use crate::config::ScoringConfig;
use crate::error::{AppError, Result};
use crate::models::{DailyScore, OuraMetrics, Provider, ProviderMetrics, WhoopMetrics};
use crate::services::metrics::MetricsRepository;
use crate::services::providers::ProviderClient;
use crate::services::scoring::{self, DayScores};
use crate::time_utils::today_utc;
use chrono::{NaiveDate, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;

/// Users aggregated concurrently by [`AggregationEngine::aggregate_many`].
const MAX_CONCURRENT_USERS: usize = 8;

/// Unified outcome of aggregating one user's day.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub date: NaiveDate,
    pub whoop: WhoopMetrics,
    pub oura: OuraMetrics,
    pub composite_recovery: Option<f64>,
    pub training_readiness: Option<f64>,
    pub errors: Vec<String>,
}

/// Totals for a batch run over many users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub users: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_user_ids: Vec<u64>,
}

/// Orchestrates both provider clients for one user at a time.
pub struct AggregationEngine {
    whoop: Arc<dyn ProviderClient<Metrics = WhoopMetrics>>,
    oura: Arc<dyn ProviderClient<Metrics = OuraMetrics>>,
    metrics: MetricsRepository,
    scoring: ScoringConfig,
}

impl AggregationEngine {
    pub fn new(
        whoop: Arc<dyn ProviderClient<Metrics = WhoopMetrics>>,
        oura: Arc<dyn ProviderClient<Metrics = OuraMetrics>>,
        metrics: MetricsRepository,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            whoop,
            oura,
            metrics,
            scoring,
        }
    }

    /// Aggregate today (UTC) for `user_id`.
    pub async fn aggregate(&self, user_id: u64) -> Result<AggregationResult> {
        self.aggregate_for_date(user_id, today_utc()).await
    }

    /// Aggregate `date` for `user_id`. Re-running overwrites the same rows.
    pub async fn aggregate_for_date(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<AggregationResult> {
        let (whoop, oura) = tokio::join!(
            self.whoop.fetch_all(user_id, date),
            self.oura.fetch_all(user_id, date)
        );

        let mut errors = Vec::new();
        let whoop = recover(user_id, self.whoop.provider(), whoop, &mut errors)?;
        let oura = recover(user_id, self.oura.provider(), oura, &mut errors)?;

        let scores = scoring::score_day(&self.scoring, &whoop, &oura);
        self.persist(user_id, date, &whoop, &oura, scores).await?;

        tracing::info!(
            user_id,
            date = %date,
            composite_recovery = ?scores.composite_recovery,
            training_readiness = ?scores.training_readiness,
            errors = errors.len(),
            "Aggregated daily metrics"
        );

        Ok(AggregationResult {
            date,
            whoop,
            oura,
            composite_recovery: scores.composite_recovery,
            training_readiness: scores.training_readiness,
            errors,
        })
    }

    async fn persist(
        &self,
        user_id: u64,
        date: NaiveDate,
        whoop: &WhoopMetrics,
        oura: &OuraMetrics,
        scores: DayScores,
    ) -> Result<()> {
        if whoop.has_data() {
            self.metrics
                .upsert_provider_snapshot(user_id, date, ProviderMetrics::Whoop(whoop.clone()))
                .await?;
        }
        if oura.has_data() {
            self.metrics
                .upsert_provider_snapshot(user_id, date, ProviderMetrics::Oura(oura.clone()))
                .await?;
        }
        if scores.is_defined() {
            let row = DailyScore {
                user_id,
                date,
                composite_recovery: scores.composite_recovery,
                training_readiness: scores.training_readiness,
                whoop_weight: self.scoring.whoop_weight,
                oura_weight: self.scoring.oura_weight,
                updated_at: Utc::now(),
            };
            self.metrics.upsert_daily_score(&row).await?;
        }
        Ok(())
    }

    /// Aggregate today for every user, a few at a time.
    ///
    /// Each user's failure is logged and counted; the batch keeps going.
    pub async fn aggregate_many(&self, user_ids: &[u64]) -> BatchSummary {
        let outcomes: Vec<(u64, bool)> = stream::iter(user_ids.iter().copied())
            .map(|user_id| async move {
                match self.aggregate(user_id).await {
                    Ok(_) => (user_id, true),
                    Err(e) => {
                        tracing::error!(user_id, error = %e, "Aggregation failed for user");
                        (user_id, false)
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_USERS)
            .collect()
            .await;

        let mut failed_user_ids: Vec<u64> = outcomes
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(user_id, _)| *user_id)
            .collect();
        failed_user_ids.sort_unstable();

        BatchSummary {
            users: user_ids.len(),
            succeeded: user_ids.len() - failed_user_ids.len(),
            failed: failed_user_ids.len(),
            failed_user_ids,
        }
    }
}

/// Turn a provider failure into an error-list entry and empty metrics.
///
/// Storage errors raised while looking up credentials are not provider
/// failures and are returned as-is.
fn recover<M: Default>(
    user_id: u64,
    provider: Provider,
    fetched: Result<M>,
    errors: &mut Vec<String>,
) -> Result<M> {
    match fetched {
        Ok(metrics) => Ok(metrics),
        Err(e @ AppError::Database(_)) => Err(e),
        Err(e) => {
            if e.requires_reauthorization() {
                tracing::warn!(user_id, provider = %provider, error = %e, "Provider needs re-authorization");
            } else {
                tracing::error!(user_id, provider = %provider, error = %e, "Provider fetch failed");
            }
            let message = match &e {
                AppError::ProviderAuth { .. } | AppError::ProviderFetch { .. } => e.to_string(),
                other => format!("{} error: {}", provider.display_name(), other),
            };
            errors.push(message);
            Ok(M::default())
        }
    }
}
