// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable provider REST clients.
//!
//! Each client fetches every sub-endpoint it knows for one day and
//! normalizes the payloads into a flat metrics struct. Failure rules shared
//! by both providers:
//! - no usable token, or any sub-endpoint answering 401: `ProviderAuth`
//! - any other sub-endpoint failure: that endpoint's fields stay absent
//! - every sub-endpoint failed: `ProviderFetch`

pub mod oura;
pub mod whoop;

pub use oura::OuraClient;
pub use whoop::WhoopClient;

use crate::error::{AppError, Result};
use crate::models::Provider;
use crate::services::CredentialManager;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// A provider that can produce normalized metrics for a user and day.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    type Metrics: Send;

    fn provider(&self) -> Provider;

    /// Fetch and normalize everything available for `today`.
    async fn fetch_all(&self, user_id: u64, today: NaiveDate) -> Result<Self::Metrics>;
}

/// Build the outbound HTTP client used for token and data requests.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}

/// Round to one decimal place, halves away from zero (`0.25` becomes `0.3`,
/// not the banker's `0.2`).
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Why a single sub-endpoint produced nothing.
#[derive(Debug)]
pub(crate) enum EndpointError {
    /// The provider rejected the access token.
    Unauthorized,
    Failed(String),
}

/// Bearer-authenticated GET helper bound to one provider's API base.
#[derive(Clone)]
pub(crate) struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    provider: Provider,
}

impl ApiClient {
    pub(crate) fn new(http: reqwest::Client, base_url: &str, provider: Provider) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
        }
    }

    pub(crate) async fn get(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, EndpointError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| EndpointError::Failed(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(EndpointError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                tracing::warn!(provider = %self.provider, path, "Provider rate limit hit (429)");
            }
            return Err(EndpointError::Failed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| EndpointError::Failed(format!("JSON parse error: {}", e)))
    }
}

/// Tracks sub-endpoint outcomes across one `fetch_all`.
pub(crate) struct EndpointTally {
    provider: Provider,
    user_id: u64,
    attempted: usize,
    failures: Vec<String>,
}

impl EndpointTally {
    pub(crate) fn new(provider: Provider, user_id: u64) -> Self {
        Self {
            provider,
            user_id,
            attempted: 0,
            failures: Vec::new(),
        }
    }

    /// Fold one endpoint result in. Only an auth rejection escapes as an error.
    pub(crate) fn record(
        &mut self,
        endpoint: &str,
        result: std::result::Result<Option<Value>, EndpointError>,
    ) -> Result<Option<Value>> {
        self.attempted += 1;
        match result {
            Ok(value) => Ok(value),
            Err(EndpointError::Unauthorized) => {
                tracing::warn!(
                    user_id = self.user_id,
                    provider = %self.provider,
                    endpoint,
                    "Provider rejected access token"
                );
                Err(AppError::ProviderAuth {
                    provider: self.provider,
                    message: format!(
                        "{} rejected the access token. Authorization required.",
                        self.provider.display_name()
                    ),
                })
            }
            Err(EndpointError::Failed(reason)) => {
                tracing::warn!(
                    user_id = self.user_id,
                    provider = %self.provider,
                    endpoint,
                    error = %reason,
                    "Provider endpoint failed, continuing without it"
                );
                self.failures.push(format!("{}: {}", endpoint, reason));
                Ok(None)
            }
        }
    }

    /// Error out only if nothing succeeded.
    pub(crate) fn finish(self) -> Result<()> {
        if self.attempted > 0 && self.failures.len() == self.attempted {
            return Err(AppError::ProviderFetch {
                provider: self.provider,
                message: self.failures.join("; "),
            });
        }
        Ok(())
    }
}

/// Resolve a usable token or fail with `ProviderAuth`.
pub(crate) async fn require_token(
    credentials: &CredentialManager,
    user_id: u64,
    provider: Provider,
) -> Result<String> {
    credentials
        .get_valid_access_token(user_id, provider)
        .await?
        .ok_or_else(|| AppError::ProviderAuth {
            provider,
            message: format!(
                "No valid {} token. Authorization required.",
                provider.display_name()
            ),
        })
}

/// Decode a payload leniently; an unexpected shape counts as empty.
pub(crate) fn decode<T: DeserializeOwned + Default>(value: Option<&Value>) -> T {
    value
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}
