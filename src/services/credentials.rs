// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential lifecycle for every (user, provider) pair.
//!
//! Handles:
//! - Authorization URLs with single-use, random state tokens
//! - Authorization code exchange on callback
//! - Proactive refresh when a token is within the safety margin of expiry
//! - Per-(user, provider) locking so concurrent callers refresh only once
//!
//! `get_valid_access_token` may suspend on a network refresh. Callers see a
//! token or nothing; expiry never surfaces as its own state.

use crate::config::{Config, ProviderConfig};
use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{OAuthState, OAuthToken, Provider};
use crate::services::oauth::{OAuthClient, TokenResponse};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Random bytes behind each OAuth state token.
const STATE_TOKEN_BYTES: usize = 32;

/// Shared refresh locks, one per (user, provider).
pub type RefreshLocks = Arc<DashMap<(u64, Provider), Arc<Mutex<()>>>>;

/// Who completed an authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub user_id: u64,
    pub provider: Provider,
}

/// Whether a user currently holds a usable credential for a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub provider: Provider,
    pub connected: bool,
}

/// Mediates the OAuth2 authorization-code flow and keeps tokens valid.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    oauth: OAuthClient,
    whoop: ProviderConfig,
    oura: ProviderConfig,
    refresh_margin: Duration,
    state_ttl: Duration,
    refresh_locks: RefreshLocks,
    rng: SystemRandom,
}

impl CredentialManager {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>, http: reqwest::Client) -> Self {
        Self {
            store,
            oauth: OAuthClient::new(http),
            whoop: config.whoop.clone(),
            oura: config.oura.clone(),
            refresh_margin: Duration::seconds(config.token_refresh_margin_secs),
            state_ttl: Duration::seconds(config.oauth_state_ttl_secs),
            refresh_locks: Arc::new(DashMap::new()),
            rng: SystemRandom::new(),
        }
    }

    fn provider_config(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Whoop => &self.whoop,
            Provider::Oura => &self.oura,
        }
    }

    // ─── Authorization Flow ──────────────────────────────────────────────────

    /// Record a pending authorization and return the provider URL to visit.
    pub async fn begin_authorization(&self, user_id: u64, provider: Provider) -> Result<String> {
        let token = self.generate_state_token()?;

        let state = OAuthState {
            token: token.clone(),
            provider,
            user_id,
            created_at: Utc::now(),
        };
        self.store.save_state(&state).await?;

        tracing::info!(user_id, provider = %provider, "Starting OAuth flow");

        Ok(authorization_url(self.provider_config(provider), &token))
    }

    /// Consume `state` and exchange `code` for tokens.
    ///
    /// The state is gone after this call whether or not the exchange works.
    pub async fn complete_authorization(&self, state: &str, code: &str) -> Result<Authorized> {
        self.complete(None, state, code).await
    }

    /// Same as [`complete_authorization`](Self::complete_authorization), but the
    /// state must have been issued for `provider`.
    pub async fn complete_authorization_for(
        &self,
        provider: Provider,
        state: &str,
        code: &str,
    ) -> Result<Authorized> {
        self.complete(Some(provider), state, code).await
    }

    async fn complete(
        &self,
        expected: Option<Provider>,
        state: &str,
        code: &str,
    ) -> Result<Authorized> {
        if state.is_empty() {
            return Err(AppError::InvalidState);
        }

        let pending = self
            .store
            .take_state(state)
            .await?
            .ok_or(AppError::InvalidState)?;

        if let Some(expected) = expected {
            if pending.provider != expected {
                tracing::warn!(
                    user_id = pending.user_id,
                    issued_for = %pending.provider,
                    callback = %expected,
                    "OAuth state used on the wrong provider callback"
                );
                return Err(AppError::InvalidState);
            }
        }

        let provider = pending.provider;
        let user_id = pending.user_id;

        tracing::info!(user_id, provider = %provider, "Exchanging authorization code for tokens");

        let tokens = self
            .oauth
            .exchange_code(self.provider_config(provider), code)
            .await
            .map_err(|e| {
                tracing::error!(user_id, provider = %provider, error = %e, "Token exchange failed");
                AppError::TokenExchange {
                    provider,
                    details: e.to_string(),
                }
            })?;

        let record = token_record(user_id, provider, &tokens, None, Utc::now());
        self.store.set_token(&record).await?;

        tracing::info!(user_id, provider = %provider, "OAuth tokens stored");

        Ok(Authorized { user_id, provider })
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Return a usable access token, refreshing first if it expires within
    /// the safety margin. `None` means the user must (re-)authorize.
    pub async fn get_valid_access_token(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<String>> {
        let Some(token) = self.store.get_token(user_id, provider).await? else {
            return Ok(None);
        };

        if !self.needs_refresh(&token, Utc::now()) {
            return Ok(Some(token.access_token));
        }

        let lock = self.refresh_lock(user_id, provider);
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let Some(token) = self.store.get_token(user_id, provider).await? else {
            return Ok(None);
        };
        if !self.needs_refresh(&token, Utc::now()) {
            return Ok(Some(token.access_token));
        }

        tracing::info!(user_id, provider = %provider, "Access token expiring, refreshing");
        self.refresh_stored(token).await
    }

    /// Refresh unconditionally with the stored refresh token.
    ///
    /// Returns `None` when there is no token or refresh token on file, or the
    /// provider refuses the grant.
    pub async fn refresh(&self, user_id: u64, provider: Provider) -> Result<Option<String>> {
        let lock = self.refresh_lock(user_id, provider);
        let _guard = lock.lock().await;

        match self.store.get_token(user_id, provider).await? {
            Some(token) => self.refresh_stored(token).await,
            None => {
                tracing::warn!(user_id, provider = %provider, "No token on file to refresh");
                Ok(None)
            }
        }
    }

    /// Must be called with the (user, provider) refresh lock held.
    async fn refresh_stored(&self, token: OAuthToken) -> Result<Option<String>> {
        let user_id = token.user_id;
        let provider = token.provider;

        let Some(refresh_token) = token.refresh_token else {
            tracing::warn!(user_id, provider = %provider, "No refresh token on file");
            return Ok(None);
        };

        let response = match self
            .oauth
            .refresh_token(self.provider_config(provider), &refresh_token)
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_invalid_grant() => {
                tracing::warn!(
                    user_id,
                    provider = %provider,
                    error = %e,
                    "Refresh grant rejected, re-authorization required"
                );
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(user_id, provider = %provider, error = %e, "Token refresh failed");
                return Ok(None);
            }
        };

        let record = token_record(user_id, provider, &response, Some(refresh_token), Utc::now());
        self.store.set_token(&record).await?;

        tracing::info!(user_id, provider = %provider, "Token refreshed");
        Ok(Some(record.access_token))
    }

    fn needs_refresh(&self, token: &OAuthToken, now: DateTime<Utc>) -> bool {
        token.expires_at - now <= self.refresh_margin
    }

    fn refresh_lock(&self, user_id: u64, provider: Provider) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry((user_id, provider))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ─── Status & Maintenance ────────────────────────────────────────────────

    /// Per-provider connection status, refreshing tokens as needed.
    pub async fn connection_status(&self, user_id: u64) -> Result<Vec<ConnectionStatus>> {
        let mut statuses = Vec::with_capacity(Provider::ALL.len());
        for provider in Provider::ALL {
            let connected = self
                .get_valid_access_token(user_id, provider)
                .await?
                .is_some();
            statuses.push(ConnectionStatus {
                provider,
                connected,
            });
        }
        Ok(statuses)
    }

    /// Drop pending states older than the configured TTL.
    pub async fn purge_expired_states(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.state_ttl;
        let purged = self.store.purge_states_before(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, "Purged stale OAuth states");
        }
        Ok(purged)
    }

    fn generate_state_token(&self) -> Result<String> {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Provider authorization endpoint with all query parameters filled in.
pub fn authorization_url(provider: &ProviderConfig, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        provider.auth_url,
        urlencoding::encode(&provider.client_id),
        urlencoding::encode(&provider.redirect_uri),
        urlencoding::encode(&provider.scopes),
        urlencoding::encode(state),
    )
}

/// Build the stored record from a token response issued at `now`.
///
/// A response without a refresh token keeps `previous_refresh`.
fn token_record(
    user_id: u64,
    provider: Provider,
    response: &TokenResponse,
    previous_refresh: Option<String>,
    now: DateTime<Utc>,
) -> OAuthToken {
    OAuthToken {
        user_id,
        provider,
        access_token: response.access_token.clone(),
        refresh_token: response.refresh_token.clone().or(previous_refresh),
        expires_at: now + Duration::seconds(response.lifetime_secs()),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(refresh: Option<&str>, expires_in: Option<i64>) -> TokenResponse {
        TokenResponse {
            access_token: "access".to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in,
            token_type: Some("bearer".to_string()),
            scope: None,
        }
    }

    #[test]
    fn test_token_record_expiry_from_lifetime() {
        let now = Utc::now();
        let record = token_record(1, Provider::Whoop, &response(Some("r"), Some(7200)), None, now);
        assert_eq!(record.expires_at, now + Duration::seconds(7200));
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn test_token_record_keeps_previous_refresh_token() {
        let now = Utc::now();
        let record = token_record(
            1,
            Provider::Oura,
            &response(None, None),
            Some("old_refresh".to_string()),
            now,
        );
        assert_eq!(record.refresh_token.as_deref(), Some("old_refresh"));
        assert_eq!(record.expires_at, now + Duration::seconds(3600));
    }

    #[test]
    fn test_token_record_prefers_rotated_refresh_token() {
        let record = token_record(
            1,
            Provider::Oura,
            &response(Some("new_refresh"), Some(60)),
            Some("old_refresh".to_string()),
            Utc::now(),
        );
        assert_eq!(record.refresh_token.as_deref(), Some("new_refresh"));
    }

    #[test]
    fn test_authorization_url_encodes_parameters() {
        let config = Config::test_default();
        let url = authorization_url(&config.whoop, "st4te-_x");

        assert!(url.starts_with("https://auth.example.com/whoop/authorize?"));
        assert!(url.contains("client_id=whoop_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback%2Fwhoop"));
        assert!(url.contains("scope=read%20offline"));
        assert!(url.contains("response_type=code"));
        assert!(url.ends_with("state=st4te-_x"));
    }
}
