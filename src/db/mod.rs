//! Database layer.
//!
//! Storage is reached through three narrow traits so the credential manager,
//! the metrics repository and the web layer only see what they use. Both
//! backends implement all of them.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::Result;
use crate::models::{DailyScore, OAuthState, OAuthToken, Provider, ProviderSnapshot, User};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const OAUTH_STATES: &str = "oauth_states";
    pub const OAUTH_TOKENS: &str = "oauth_tokens";
    /// Per-provider daily snapshots keyed by `{user_id}_{provider}_{date}`
    pub const PROVIDER_SNAPSHOTS: &str = "provider_snapshots";
    /// Composite scores keyed by `{user_id}_{date}`
    pub const DAILY_SCORES: &str = "daily_scores";
}

/// OAuth state and token persistence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save_state(&self, state: &OAuthState) -> Result<()>;

    /// Remove and return the state. At most one caller ever gets `Some`.
    async fn take_state(&self, token: &str) -> Result<Option<OAuthState>>;

    /// Delete unconsumed states created before `cutoff`; returns how many.
    async fn purge_states_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn get_token(&self, user_id: u64, provider: Provider) -> Result<Option<OAuthToken>>;

    /// Insert or fully replace the token for `(token.user_id, token.provider)`.
    async fn set_token(&self, token: &OAuthToken) -> Result<()>;
}

/// Daily snapshot and score persistence. All writes are same-key overwrites.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn upsert_snapshot(&self, snapshot: &ProviderSnapshot) -> Result<()>;

    async fn upsert_daily_score(&self, score: &DailyScore) -> Result<()>;

    async fn get_snapshot(
        &self,
        user_id: u64,
        provider: Provider,
        date: NaiveDate,
    ) -> Result<Option<ProviderSnapshot>>;

    async fn get_daily_score(&self, user_id: u64, date: NaiveDate) -> Result<Option<DailyScore>>;

    /// Snapshots with `since <= date < before`, newest first.
    async fn list_snapshots(
        &self,
        user_id: u64,
        since: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<ProviderSnapshot>>;

    /// Scores with `since <= date < before`, newest first.
    async fn list_daily_scores(
        &self,
        user_id: u64,
        since: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<DailyScore>>;
}

/// Known users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the user on first sight, otherwise bump `last_active`.
    async fn ensure_user(&self, user_id: u64) -> Result<User>;

    async fn get_user(&self, user_id: u64) -> Result<Option<User>>;

    async fn list_user_ids(&self) -> Result<Vec<u64>>;
}

/// Everything the application needs from a storage backend.
pub trait Database: CredentialStore + MetricsStore + UserStore {}

impl<T: CredentialStore + MetricsStore + UserStore> Database for T {}

/// Build the user record for `ensure_user`.
pub(crate) fn touched_user(existing: Option<User>, user_id: u64, now: DateTime<Utc>) -> User {
    match existing {
        Some(mut user) => {
            user.last_active = now;
            user
        }
        None => User {
            user_id,
            created_at: now,
            last_active: now,
        },
    }
}
