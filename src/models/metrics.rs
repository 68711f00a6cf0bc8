// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized wearable metrics, daily snapshots and composite scores.

use crate::models::Provider;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flattened contributor sub-scores (`contributor name -> value`).
pub type Contributors = BTreeMap<String, f64>;

/// One day of Whoop data, flattened and unit-converted.
///
/// Durations are minutes. `raw` keeps the untouched API payloads
/// (`recovery`, `sleep`, `workout`) for audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoopMetrics {
    // Recovery
    pub recovery_score: Option<f64>,
    pub hrv_rmssd: Option<f64>,
    pub rhr: Option<f64>,
    pub spo2: Option<f64>,
    pub skin_temp_c: Option<f64>,
    // Sleep
    pub sleep_duration_min: Option<f64>,
    pub sleep_efficiency: Option<f64>,
    pub sleep_performance: Option<f64>,
    pub sleep_consistency: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub disturbance_count: Option<i64>,
    pub sleep_cycles: Option<i64>,
    pub light_sleep_min: Option<f64>,
    pub deep_sleep_min: Option<f64>,
    pub rem_sleep_min: Option<f64>,
    pub awake_min: Option<f64>,
    pub sleep_needed_min: Option<f64>,
    // Workout
    pub workout_strain: Option<f64>,

    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl WhoopMetrics {
    /// True when at least one normalized field carries a value.
    pub fn has_data(&self) -> bool {
        let floats = [
            self.recovery_score,
            self.hrv_rmssd,
            self.rhr,
            self.spo2,
            self.skin_temp_c,
            self.sleep_duration_min,
            self.sleep_efficiency,
            self.sleep_performance,
            self.sleep_consistency,
            self.respiratory_rate,
            self.light_sleep_min,
            self.deep_sleep_min,
            self.rem_sleep_min,
            self.awake_min,
            self.sleep_needed_min,
            self.workout_strain,
        ];
        floats.iter().any(Option::is_some)
            || self.disturbance_count.is_some()
            || self.sleep_cycles.is_some()
    }
}

/// One day of Oura data, flattened and unit-converted.
///
/// Stress and recovery durations are hours. `raw` keeps the untouched API
/// payloads (`readiness`, `sleep`, `activity`, `stress`, `spo2`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OuraMetrics {
    // Readiness
    pub readiness_score: Option<f64>,
    pub readiness_contributors: Option<Contributors>,
    pub temperature_deviation: Option<f64>,
    pub temperature_trend_deviation: Option<f64>,
    // Sleep
    pub sleep_score: Option<f64>,
    pub sleep_contributors: Option<Contributors>,
    // Activity
    pub activity_score: Option<f64>,
    pub activity_contributors: Option<Contributors>,
    pub steps: Option<i64>,
    pub active_calories: Option<f64>,
    // Stress
    pub stress_high: Option<f64>,
    pub recovery_high: Option<f64>,
    pub day_summary: Option<String>,
    // SpO2
    pub spo2_avg: Option<f64>,

    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl OuraMetrics {
    /// True when at least one normalized field carries a value.
    pub fn has_data(&self) -> bool {
        let floats = [
            self.readiness_score,
            self.temperature_deviation,
            self.temperature_trend_deviation,
            self.sleep_score,
            self.activity_score,
            self.active_calories,
            self.stress_high,
            self.recovery_high,
            self.spo2_avg,
        ];
        floats.iter().any(Option::is_some)
            || self.readiness_contributors.is_some()
            || self.sleep_contributors.is_some()
            || self.activity_contributors.is_some()
            || self.steps.is_some()
            || self.day_summary.is_some()
    }
}

/// Normalized metrics tagged by provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMetrics {
    Whoop(WhoopMetrics),
    Oura(OuraMetrics),
}

impl ProviderMetrics {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderMetrics::Whoop(_) => Provider::Whoop,
            ProviderMetrics::Oura(_) => Provider::Oura,
        }
    }

    pub fn has_data(&self) -> bool {
        match self {
            ProviderMetrics::Whoop(m) => m.has_data(),
            ProviderMetrics::Oura(m) => m.has_data(),
        }
    }

    pub fn raw(&self) -> &serde_json::Value {
        match self {
            ProviderMetrics::Whoop(m) => &m.raw,
            ProviderMetrics::Oura(m) => &m.raw,
        }
    }
}

/// Stored daily snapshot for one (user, date, provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub user_id: u64,
    pub date: NaiveDate,
    pub provider: Provider,
    pub metrics: ProviderMetrics,
    /// Original API payloads as JSON text
    pub raw_json: String,
    pub updated_at: DateTime<Utc>,
}

impl ProviderSnapshot {
    pub fn new(user_id: u64, date: NaiveDate, metrics: ProviderMetrics) -> Self {
        let raw_json = serde_json::to_string(metrics.raw()).unwrap_or_else(|_| "{}".to_string());
        Self {
            user_id,
            date,
            provider: metrics.provider(),
            metrics,
            raw_json,
            updated_at: Utc::now(),
        }
    }

    /// Document key: `{user_id}_{provider}_{date}`.
    pub fn key(user_id: u64, provider: Provider, date: NaiveDate) -> String {
        format!("{}_{}_{}", user_id, provider, date)
    }

    pub fn document_id(&self) -> String {
        Self::key(self.user_id, self.provider, self.date)
    }
}

/// Composite scores for one (user, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyScore {
    pub user_id: u64,
    pub date: NaiveDate,
    pub composite_recovery: Option<f64>,
    pub training_readiness: Option<f64>,
    pub whoop_weight: f64,
    pub oura_weight: f64,
    pub updated_at: DateTime<Utc>,
}

impl DailyScore {
    /// Document key: `{user_id}_{date}`.
    pub fn key(user_id: u64, date: NaiveDate) -> String {
        format!("{}_{}", user_id, date)
    }

    pub fn document_id(&self) -> String {
        Self::key(self.user_id, self.date)
    }
}

/// Everything stored for a user on one past day.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub whoop: Option<WhoopMetrics>,
    pub oura: Option<OuraMetrics>,
    pub scores: Option<DailyScore>,
}
