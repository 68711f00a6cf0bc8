// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Composite recovery and training readiness.
//!
//! Pure functions over normalized metrics. Non-finite inputs are treated
//! the same as missing ones.

use crate::config::ScoringConfig;
use crate::models::{OuraMetrics, WhoopMetrics};
use crate::services::providers::round1;

/// Scores derived for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayScores {
    pub composite_recovery: Option<f64>,
    pub training_readiness: Option<f64>,
}

impl DayScores {
    pub fn is_defined(&self) -> bool {
        self.composite_recovery.is_some() || self.training_readiness.is_some()
    }
}

/// Signals that pull training readiness down from composite recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PenaltyInputs {
    pub stress_high_hours: Option<f64>,
    pub temperature_deviation: Option<f64>,
    pub spo2: Option<f64>,
}

impl PenaltyInputs {
    /// SpO2 comes from Whoop when present, otherwise from Oura.
    pub fn from_metrics(whoop: &WhoopMetrics, oura: &OuraMetrics) -> Self {
        Self {
            stress_high_hours: finite(oura.stress_high),
            temperature_deviation: finite(oura.temperature_deviation),
            spo2: finite(whoop.spo2).or(finite(oura.spo2_avg)),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Weighted mean of Whoop recovery and Oura readiness, or whichever exists.
pub fn composite_recovery(
    config: &ScoringConfig,
    whoop_recovery: Option<f64>,
    oura_readiness: Option<f64>,
) -> Option<f64> {
    match (finite(whoop_recovery), finite(oura_readiness)) {
        (Some(a), Some(b)) => {
            let total = config.whoop_weight + config.oura_weight;
            let blended = if total > 0.0 {
                (a * config.whoop_weight + b * config.oura_weight) / total
            } else {
                (a + b) / 2.0
            };
            Some(round1(blended))
        }
        (Some(a), None) => Some(round1(a)),
        (None, Some(b)) => Some(round1(b)),
        (None, None) => None,
    }
}

pub fn stress_penalty(config: &ScoringConfig, stress_high_hours: Option<f64>) -> f64 {
    stress_high_hours
        .map(|h| (h * config.stress_penalty_per_hour).clamp(0.0, config.stress_penalty_cap))
        .unwrap_or(0.0)
}

pub fn temperature_penalty(config: &ScoringConfig, deviation: Option<f64>) -> f64 {
    deviation
        .map(|d| {
            (d.abs() * config.temperature_penalty_per_degree)
                .clamp(0.0, config.temperature_penalty_cap)
        })
        .unwrap_or(0.0)
}

/// Uncapped: every point below the threshold costs the full rate.
pub fn spo2_penalty(config: &ScoringConfig, spo2: Option<f64>) -> f64 {
    spo2.map(|s| (config.spo2_threshold - s).max(0.0) * config.spo2_penalty_per_point)
        .unwrap_or(0.0)
}

/// Composite recovery minus penalties, clamped to `[0, 100]`.
pub fn training_readiness(
    config: &ScoringConfig,
    composite: Option<f64>,
    inputs: &PenaltyInputs,
) -> Option<f64> {
    let composite = finite(composite)?;
    let penalty = stress_penalty(config, inputs.stress_high_hours)
        + temperature_penalty(config, inputs.temperature_deviation)
        + spo2_penalty(config, inputs.spo2);
    Some(round1((composite - penalty).clamp(0.0, 100.0)))
}

/// Score one day from both providers' normalized metrics.
pub fn score_day(config: &ScoringConfig, whoop: &WhoopMetrics, oura: &OuraMetrics) -> DayScores {
    let composite = composite_recovery(config, whoop.recovery_score, oura.readiness_score);
    let inputs = PenaltyInputs::from_metrics(whoop, oura);
    DayScores {
        composite_recovery: composite,
        training_readiness: training_readiness(config, composite, &inputs),
    }
}
