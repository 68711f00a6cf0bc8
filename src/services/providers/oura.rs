// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Oura API v2 (`usercollection`) client.

use super::{decode, require_token, round1, ApiClient, EndpointError, EndpointTally, ProviderClient};
use crate::config::{FallbackPolicy, ProviderConfig};
use crate::error::Result;
use crate::models::{Contributors, OuraMetrics, Provider};
use crate::services::CredentialManager;
use crate::time_utils::days_before;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const READINESS_PATH: &str = "/daily_readiness";
const SLEEP_PATH: &str = "/daily_sleep";
const ACTIVITY_PATH: &str = "/daily_activity";
const STRESS_PATH: &str = "/daily_stress";
const SPO2_PATH: &str = "/daily_spo2";

const SECONDS_PER_HOUR: f64 = 3600.0;

// ─── Response Shapes ─────────────────────────────────────────────────────────

type RawContributors = BTreeMap<String, Option<f64>>;

#[derive(Debug, Default, Deserialize)]
struct Readiness {
    score: Option<f64>,
    contributors: Option<RawContributors>,
    temperature_deviation: Option<f64>,
    temperature_trend_deviation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct DailySleep {
    score: Option<f64>,
    contributors: Option<RawContributors>,
}

#[derive(Debug, Default, Deserialize)]
struct Activity {
    score: Option<f64>,
    contributors: Option<RawContributors>,
    steps: Option<i64>,
    active_calories: Option<f64>,
}

/// High-stress and high-recovery durations are seconds.
#[derive(Debug, Default, Deserialize)]
struct Stress {
    stress_high: Option<f64>,
    recovery_high: Option<f64>,
    day_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Spo2 {
    spo2_percentage: Option<Spo2Percentage>,
}

#[derive(Debug, Default, Deserialize)]
struct Spo2Percentage {
    average: Option<f64>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Oura metrics client.
pub struct OuraClient {
    api: ApiClient,
    credentials: Arc<CredentialManager>,
    fallback: FallbackPolicy,
}

impl OuraClient {
    pub fn new(
        http: reqwest::Client,
        config: &ProviderConfig,
        credentials: Arc<CredentialManager>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            api: ApiClient::new(http, &config.api_base, Provider::Oura),
            credentials,
            fallback,
        }
    }

    /// Today's document, or the most recent one within `lookback_days`.
    async fn daily(
        &self,
        access_token: &str,
        path: &str,
        today: NaiveDate,
        lookback_days: u32,
    ) -> std::result::Result<Option<Value>, EndpointError> {
        let items = self.documents(access_token, path, today, today).await?;
        if let Some(first) = items.into_iter().next() {
            return Ok(Some(first));
        }
        if lookback_days == 0 {
            return Ok(None);
        }

        tracing::debug!(path, lookback_days, "No Oura document today, widening window");
        let items = self
            .documents(access_token, path, days_before(today, lookback_days), today)
            .await?;
        // Documents come back in ascending day order.
        Ok(items.into_iter().last())
    }

    async fn documents(
        &self,
        access_token: &str,
        path: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> std::result::Result<Vec<Value>, EndpointError> {
        let query = [
            ("start_date", from.to_string()),
            ("end_date", to.to_string()),
        ];
        let body = self.api.get(access_token, path, &query).await?;

        Ok(match body.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        })
    }
}

#[async_trait]
impl ProviderClient for OuraClient {
    type Metrics = OuraMetrics;

    fn provider(&self) -> Provider {
        Provider::Oura
    }

    async fn fetch_all(&self, user_id: u64, today: NaiveDate) -> Result<OuraMetrics> {
        let token = require_token(&self.credentials, user_id, Provider::Oura).await?;
        let mut tally = EndpointTally::new(Provider::Oura, user_id);

        let readiness = tally.record(
            "readiness",
            self.daily(&token, READINESS_PATH, today, 0).await,
        )?;
        let sleep = tally.record("sleep", self.daily(&token, SLEEP_PATH, today, 0).await)?;
        let activity = tally.record(
            "activity",
            self.daily(&token, ACTIVITY_PATH, today, self.fallback.oura_activity_days)
                .await,
        )?;
        let stress = tally.record("stress", self.daily(&token, STRESS_PATH, today, 0).await)?;
        let spo2 = tally.record("spo2", self.daily(&token, SPO2_PATH, today, 0).await)?;
        tally.finish()?;

        let metrics = normalize(
            readiness.as_ref(),
            sleep.as_ref(),
            activity.as_ref(),
            stress.as_ref(),
            spo2.as_ref(),
        );
        tracing::debug!(user_id, has_data = metrics.has_data(), "Fetched Oura metrics");
        Ok(metrics)
    }
}

// ─── Normalization ───────────────────────────────────────────────────────────

fn flatten(contributors: Option<RawContributors>) -> Option<Contributors> {
    let flat: Contributors = contributors?
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect();
    (!flat.is_empty()).then_some(flat)
}

fn hours(seconds: Option<f64>) -> Option<f64> {
    seconds.map(|s| round1(s / SECONDS_PER_HOUR))
}

/// Flatten the daily documents into one record.
pub fn normalize(
    readiness: Option<&Value>,
    sleep: Option<&Value>,
    activity: Option<&Value>,
    stress: Option<&Value>,
    spo2: Option<&Value>,
) -> OuraMetrics {
    let r: Readiness = decode(readiness);
    let s: DailySleep = decode(sleep);
    let a: Activity = decode(activity);
    let st: Stress = decode(stress);
    let o: Spo2 = decode(spo2);

    let raw_or_empty = |v: Option<&Value>| v.cloned().unwrap_or_else(|| json!({}));

    OuraMetrics {
        readiness_score: r.score,
        readiness_contributors: flatten(r.contributors),
        temperature_deviation: r.temperature_deviation,
        temperature_trend_deviation: r.temperature_trend_deviation,
        sleep_score: s.score,
        sleep_contributors: flatten(s.contributors),
        activity_score: a.score,
        activity_contributors: flatten(a.contributors),
        steps: a.steps,
        active_calories: a.active_calories,
        stress_high: hours(st.stress_high),
        recovery_high: hours(st.recovery_high),
        day_summary: st.day_summary,
        spo2_avg: o.spo2_percentage.and_then(|p| p.average),
        raw: json!({
            "readiness": raw_or_empty(readiness),
            "sleep": raw_or_empty(sleep),
            "activity": raw_or_empty(activity),
            "stress": raw_or_empty(stress),
            "spo2": raw_or_empty(spo2),
        }),
    }
}
