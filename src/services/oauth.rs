// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth2 token endpoint client.
//!
//! Handles the two grants this service uses (authorization code and refresh
//! token) for any provider. How the client secret travels is taken from the
//! provider's [`ClientAuth`] setting rather than decided per call site.

use crate::config::{ClientAuth, ProviderConfig};
use serde::Deserialize;

/// Lifetime assumed when a provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Token endpoint response (RFC 6749 §5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds from issuance
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn lifetime_secs(&self) -> i64 {
        self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
    }
}

/// Failure talking to a token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TokenEndpointError {
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status; `body` is its payload.
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to parse token response: {0}")]
    Parse(String),
}

impl TokenEndpointError {
    /// Rejected grant (expired, revoked or rotated refresh token).
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, TokenEndpointError::Rejected { status, body }
            if *status == 400 || *status == 401 || body.contains("invalid_grant"))
    }
}

/// Token endpoint client shared across providers.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        provider: &ProviderConfig,
        code: &str,
    ) -> Result<TokenResponse, TokenEndpointError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", provider.redirect_uri.as_str()),
        ];
        self.post_token(provider, &form).await
    }

    /// Obtain a new token pair with a refresh token.
    pub async fn refresh_token(
        &self,
        provider: &ProviderConfig,
        refresh_token: &str,
    ) -> Result<TokenResponse, TokenEndpointError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.post_token(provider, &form).await
    }

    async fn post_token(
        &self,
        provider: &ProviderConfig,
        grant: &[(&str, &str)],
    ) -> Result<TokenResponse, TokenEndpointError> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        let request = self.http.post(&provider.token_url);

        let request = match provider.client_auth {
            ClientAuth::RequestBody => {
                form.push(("client_id", provider.client_id.as_str()));
                form.push(("client_secret", provider.client_secret.as_str()));
                request
            }
            ClientAuth::BasicAuth => {
                request.basic_auth(&provider.client_id, Some(&provider.client_secret))
            }
        };

        let response = request
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenEndpointError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %provider.provider,
                status,
                "Token endpoint rejected request"
            );
            return Err(TokenEndpointError::Rejected { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| TokenEndpointError::Parse(e.to_string()))
    }
}
