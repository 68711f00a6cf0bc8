//! User and OAuth credential models for storage.

use crate::models::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the service (created on first interaction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque numeric user ID (also used as document ID)
    pub user_id: u64,
    /// When the user first interacted
    pub created_at: DateTime<Utc>,
    /// Most recent interaction
    pub last_active: DateTime<Utc>,
}

/// Pending OAuth authorization attempt, keyed by its state token.
///
/// Single-use: removed by the first callback lookup, whatever the outcome
/// of the code exchange that follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub token: String,
    pub provider: Provider,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Stored OAuth credentials for one (user, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub user_id: u64,
    pub provider: Provider,
    pub access_token: String,
    /// Absent when the provider never issued one
    pub refresh_token: Option<String>,
    /// Issue time plus the provider-reported lifetime
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthToken {
    /// Document key for the (user, provider) pair.
    pub fn key(user_id: u64, provider: Provider) -> String {
        format!("{}_{}", user_id, provider)
    }
}
