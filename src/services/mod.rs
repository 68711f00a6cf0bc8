// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregation;
pub mod credentials;
pub mod metrics;
pub mod oauth;
pub mod providers;
pub mod scoring;

pub use aggregation::{AggregationEngine, AggregationResult, BatchSummary};
pub use credentials::{Authorized, ConnectionStatus, CredentialManager};
pub use metrics::MetricsRepository;
pub use providers::{OuraClient, ProviderClient, WhoopClient};
