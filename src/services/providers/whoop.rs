// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Whoop developer API (v2) client.
//!
//! Each collection is queried for the latest record inside today's UTC
//! window. Recovery and sleep are usually scored against the previous night,
//! so those windows may widen backwards per [`FallbackPolicy`].

use super::{decode, require_token, round1, ApiClient, EndpointError, EndpointTally, ProviderClient};
use crate::config::{FallbackPolicy, ProviderConfig};
use crate::error::Result;
use crate::models::{Provider, WhoopMetrics};
use crate::services::CredentialManager;
use crate::time_utils::{days_before, end_of_day, format_utc_rfc3339_millis, start_of_day};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const RECOVERY_PATH: &str = "/recovery";
const SLEEP_PATH: &str = "/activity/sleep";
const WORKOUT_PATH: &str = "/activity/workout";

const MILLIS_PER_MINUTE: f64 = 60_000.0;

// ─── Response Shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct Recovery {
    score: Option<RecoveryScore>,
}

#[derive(Debug, Default, Deserialize)]
struct RecoveryScore {
    recovery_score: Option<f64>,
    resting_heart_rate: Option<f64>,
    hrv_rmssd_milli: Option<f64>,
    spo2_percentage: Option<f64>,
    skin_temp_celsius: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Sleep {
    score: Option<SleepScore>,
}

#[derive(Debug, Default, Deserialize)]
struct SleepScore {
    stage_summary: Option<StageSummary>,
    sleep_needed: Option<SleepNeeded>,
    respiratory_rate: Option<f64>,
    sleep_performance_percentage: Option<f64>,
    sleep_consistency_percentage: Option<f64>,
    sleep_efficiency_percentage: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StageSummary {
    total_awake_time_milli: Option<i64>,
    total_light_sleep_time_milli: Option<i64>,
    total_slow_wave_sleep_time_milli: Option<i64>,
    total_rem_sleep_time_milli: Option<i64>,
    sleep_cycle_count: Option<i64>,
    disturbance_count: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SleepNeeded {
    baseline_milli: Option<i64>,
    need_from_sleep_debt_milli: Option<i64>,
    need_from_recent_strain_milli: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Workout {
    score: Option<WorkoutScore>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkoutScore {
    strain: Option<f64>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Whoop metrics client.
pub struct WhoopClient {
    api: ApiClient,
    credentials: Arc<CredentialManager>,
    fallback: FallbackPolicy,
}

impl WhoopClient {
    pub fn new(
        http: reqwest::Client,
        config: &ProviderConfig,
        credentials: Arc<CredentialManager>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self {
            api: ApiClient::new(http, &config.api_base, Provider::Whoop),
            credentials,
            fallback,
        }
    }

    /// Latest record for `today`, widening the window by `lookback_days`
    /// when today has none.
    async fn latest(
        &self,
        access_token: &str,
        path: &str,
        today: NaiveDate,
        lookback_days: u32,
    ) -> std::result::Result<Option<Value>, EndpointError> {
        let record = self.first_record(access_token, path, today, today).await?;
        if record.is_some() || lookback_days == 0 {
            return Ok(record);
        }

        tracing::debug!(path, lookback_days, "No Whoop record today, widening window");
        self.first_record(access_token, path, days_before(today, lookback_days), today)
            .await
    }

    async fn first_record(
        &self,
        access_token: &str,
        path: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> std::result::Result<Option<Value>, EndpointError> {
        let query = [
            ("start", format_utc_rfc3339_millis(start_of_day(from))),
            ("end", format_utc_rfc3339_millis(end_of_day(to))),
            ("limit", "1".to_string()),
        ];
        let body = self.api.get(access_token, path, &query).await?;

        // Records are returned newest first.
        Ok(body
            .get("records")
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .cloned())
    }
}

#[async_trait]
impl ProviderClient for WhoopClient {
    type Metrics = WhoopMetrics;

    fn provider(&self) -> Provider {
        Provider::Whoop
    }

    async fn fetch_all(&self, user_id: u64, today: NaiveDate) -> Result<WhoopMetrics> {
        let token = require_token(&self.credentials, user_id, Provider::Whoop).await?;
        let mut tally = EndpointTally::new(Provider::Whoop, user_id);

        let recovery = tally.record(
            "recovery",
            self.latest(&token, RECOVERY_PATH, today, self.fallback.whoop_recovery_days)
                .await,
        )?;
        let sleep = tally.record(
            "sleep",
            self.latest(&token, SLEEP_PATH, today, self.fallback.whoop_sleep_days)
                .await,
        )?;
        let workout = tally.record(
            "workout",
            self.latest(&token, WORKOUT_PATH, today, self.fallback.whoop_workout_days)
                .await,
        )?;
        tally.finish()?;

        let metrics = normalize(recovery.as_ref(), sleep.as_ref(), workout.as_ref());
        tracing::debug!(user_id, has_data = metrics.has_data(), "Fetched Whoop metrics");
        Ok(metrics)
    }
}

// ─── Normalization ───────────────────────────────────────────────────────────

/// Milliseconds to minutes at one decimal; zero or missing is absent.
fn minutes(millis: Option<i64>) -> Option<f64> {
    match millis {
        Some(ms) if ms != 0 => Some(round1(ms as f64 / MILLIS_PER_MINUTE)),
        _ => None,
    }
}

/// Flatten the latest recovery, sleep and workout records.
pub fn normalize(
    recovery: Option<&Value>,
    sleep: Option<&Value>,
    workout: Option<&Value>,
) -> WhoopMetrics {
    let recovery_score = decode::<Recovery>(recovery).score.unwrap_or_default();
    let sleep_score = decode::<Sleep>(sleep).score.unwrap_or_default();
    let workout_score = decode::<Workout>(workout).score.unwrap_or_default();

    let stages = sleep_score.stage_summary.unwrap_or_default();
    let needed = sleep_score.sleep_needed.unwrap_or_default();

    let asleep_millis = stages.total_light_sleep_time_milli.unwrap_or(0)
        + stages.total_slow_wave_sleep_time_milli.unwrap_or(0)
        + stages.total_rem_sleep_time_milli.unwrap_or(0);
    let needed_millis = needed.baseline_milli.unwrap_or(0)
        + needed.need_from_sleep_debt_milli.unwrap_or(0)
        + needed.need_from_recent_strain_milli.unwrap_or(0);

    WhoopMetrics {
        recovery_score: recovery_score.recovery_score,
        hrv_rmssd: recovery_score.hrv_rmssd_milli,
        rhr: recovery_score.resting_heart_rate,
        spo2: recovery_score.spo2_percentage,
        skin_temp_c: recovery_score.skin_temp_celsius,
        sleep_duration_min: minutes(Some(asleep_millis)),
        sleep_efficiency: sleep_score.sleep_efficiency_percentage,
        sleep_performance: sleep_score.sleep_performance_percentage,
        sleep_consistency: sleep_score.sleep_consistency_percentage,
        respiratory_rate: sleep_score.respiratory_rate,
        disturbance_count: stages.disturbance_count,
        sleep_cycles: stages.sleep_cycle_count,
        light_sleep_min: minutes(stages.total_light_sleep_time_milli),
        deep_sleep_min: minutes(stages.total_slow_wave_sleep_time_milli),
        rem_sleep_min: minutes(stages.total_rem_sleep_time_milli),
        awake_min: minutes(stages.total_awake_time_milli),
        sleep_needed_min: minutes(Some(needed_millis)),
        workout_strain: workout_score.strain,
        raw: json!({
            "recovery": recovery.cloned().unwrap_or_else(|| json!({})),
            "sleep": sleep.cloned().unwrap_or_else(|| json!({})),
            "workout": workout.cloned().unwrap_or_else(|| json!({})),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full_day() {
        let recovery = json!({
            "cycle_id": 93845,
            "score": {
                "recovery_score": 44,
                "resting_heart_rate": 64,
                "hrv_rmssd_milli": 31.813562,
                "spo2_percentage": 95.6875,
                "skin_temp_celsius": 33.7
            }
        });
        let sleep = json!({
            "score": {
                "stage_summary": {
                    "total_in_bed_time_milli": 30272735,
                    "total_awake_time_milli": 1403507,
                    "total_light_sleep_time_milli": 14905851,
                    "total_slow_wave_sleep_time_milli": 6630370,
                    "total_rem_sleep_time_milli": 5879573,
                    "sleep_cycle_count": 3,
                    "disturbance_count": 12
                },
                "sleep_needed": {
                    "baseline_milli": 27395716,
                    "need_from_sleep_debt_milli": 352230,
                    "need_from_recent_strain_milli": 208595,
                    "need_from_recent_nap_milli": -12312
                },
                "respiratory_rate": 16.11328125,
                "sleep_performance_percentage": 98,
                "sleep_consistency_percentage": 90,
                "sleep_efficiency_percentage": 91.69533848
            }
        });
        let workout = json!({"score": {"strain": 8.2463}});

        let m = normalize(Some(&recovery), Some(&sleep), Some(&workout));

        assert_eq!(m.recovery_score, Some(44.0));
        assert_eq!(m.rhr, Some(64.0));
        assert_eq!(m.spo2, Some(95.6875));
        assert_eq!(m.light_sleep_min, Some(248.4));
        assert_eq!(m.deep_sleep_min, Some(110.5));
        assert_eq!(m.rem_sleep_min, Some(98.0));
        assert_eq!(m.awake_min, Some(23.4));
        // light + deep + REM
        assert_eq!(m.sleep_duration_min, Some(456.9));
        // baseline + debt + strain, naps excluded
        assert_eq!(m.sleep_needed_min, Some(465.9));
        assert_eq!(m.sleep_cycles, Some(3));
        assert_eq!(m.disturbance_count, Some(12));
        assert_eq!(m.workout_strain, Some(8.2463));
        assert_eq!(m.raw["recovery"]["cycle_id"], 93845);
    }

    #[test]
    fn test_normalize_missing_records() {
        let m = normalize(None, None, None);
        assert!(!m.has_data());
        assert_eq!(m.raw["sleep"], json!({}));
    }

    #[test]
    fn test_unscored_recovery_is_absent() {
        let recovery = json!({"score_state": "PENDING_SCORE"});
        let m = normalize(Some(&recovery), None, None);
        assert_eq!(m.recovery_score, None);
        assert!(!m.has_data());
    }

    #[test]
    fn test_zero_durations_are_absent() {
        let sleep = json!({"score": {"stage_summary": {"total_awake_time_milli": 0}}});
        let m = normalize(None, Some(&sleep), None);
        assert_eq!(m.awake_min, None);
        assert_eq!(m.sleep_duration_min, None);
    }
}
