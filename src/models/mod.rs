// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod metrics;
pub mod provider;
pub mod user;

pub use metrics::{
    Contributors, DailyScore, HistoryDay, OuraMetrics, ProviderMetrics, ProviderSnapshot,
    WhoopMetrics,
};
pub use provider::Provider;
pub use user::{OAuthState, OAuthToken, User};
