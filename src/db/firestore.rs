// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (first-seen / last-active)
//! - OAuth states (single-use correlation tokens)
//! - OAuth tokens (per user and provider)
//! - Provider snapshots and daily composite scores

use crate::db::{collections, touched_user, CredentialStore, MetricsStore, UserStore};
use crate::error::{AppError, Result};
use crate::models::{DailyScore, OAuthState, OAuthToken, Provider, ProviderSnapshot, User};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use firestore::errors::FirestoreError;
use firestore::{FirestoreQueryDirection, FirestoreWritePrecondition};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Fetch one document by ID.
    async fn get_doc<T>(&self, collection: &str, doc_id: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write a full document, replacing whatever was stored under `doc_id`.
    async fn put_doc<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<()>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, doc_ids: &[String], collection: &str) -> Result<()> {
        let client = self.get_client()?;

        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Whether a failed precondition delete means someone else deleted first.
fn lost_delete_race(err: &FirestoreError) -> bool {
    match err {
        FirestoreError::DataNotFoundError(_) => true,
        FirestoreError::DatabaseError(e) => e.public.code == "FailedPrecondition",
        _ => false,
    }
}

// ─── OAuth State & Token Operations ──────────────────────────

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn save_state(&self, state: &OAuthState) -> Result<()> {
        self.put_doc(collections::OAUTH_STATES, &state.token, state)
            .await
    }

    /// Read the state, then delete it with an `exists` precondition.
    ///
    /// When two callbacks race, only one delete can satisfy the precondition;
    /// the loser sees `None`.
    async fn take_state(&self, token: &str) -> Result<Option<OAuthState>> {
        let state: Option<OAuthState> = self.get_doc(collections::OAUTH_STATES, token).await?;
        let Some(state) = state else {
            return Ok(None);
        };

        let deleted = self
            .get_client()?
            .fluent()
            .delete()
            .from(collections::OAUTH_STATES)
            .document_id(token)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .execute()
            .await;

        match deleted {
            Ok(()) => Ok(Some(state)),
            Err(e) if lost_delete_race(&e) => {
                tracing::warn!(
                    user_id = state.user_id,
                    provider = %state.provider,
                    "OAuth state consumed by a concurrent callback"
                );
                Ok(None)
            }
            Err(e) => Err(AppError::Database(format!(
                "Failed to consume OAuth state: {}",
                e
            ))),
        }
    }

    async fn purge_states_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let states: Vec<OAuthState> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::OAUTH_STATES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let stale: Vec<String> = states
            .into_iter()
            .filter(|s| s.created_at < cutoff)
            .map(|s| s.token)
            .collect();

        self.batch_delete(&stale, collections::OAUTH_STATES).await?;
        Ok(stale.len())
    }

    async fn get_token(&self, user_id: u64, provider: Provider) -> Result<Option<OAuthToken>> {
        self.get_doc(collections::OAUTH_TOKENS, &OAuthToken::key(user_id, provider))
            .await
    }

    async fn set_token(&self, token: &OAuthToken) -> Result<()> {
        self.put_doc(
            collections::OAUTH_TOKENS,
            &OAuthToken::key(token.user_id, token.provider),
            token,
        )
        .await
    }
}

// ─── Snapshot & Score Operations ─────────────────────────────

#[async_trait]
impl MetricsStore for FirestoreDb {
    async fn upsert_snapshot(&self, snapshot: &ProviderSnapshot) -> Result<()> {
        self.put_doc(
            collections::PROVIDER_SNAPSHOTS,
            &snapshot.document_id(),
            snapshot,
        )
        .await
    }

    async fn upsert_daily_score(&self, score: &DailyScore) -> Result<()> {
        self.put_doc(collections::DAILY_SCORES, &score.document_id(), score)
            .await
    }

    async fn get_snapshot(
        &self,
        user_id: u64,
        provider: Provider,
        date: NaiveDate,
    ) -> Result<Option<ProviderSnapshot>> {
        self.get_doc(
            collections::PROVIDER_SNAPSHOTS,
            &ProviderSnapshot::key(user_id, provider, date),
        )
        .await
    }

    async fn get_daily_score(&self, user_id: u64, date: NaiveDate) -> Result<Option<DailyScore>> {
        self.get_doc(collections::DAILY_SCORES, &DailyScore::key(user_id, date))
            .await
    }

    async fn list_snapshots(
        &self,
        user_id: u64,
        since: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<ProviderSnapshot>> {
        // Dates are stored as ISO strings, which sort chronologically.
        let since = since.to_string();
        let before = before.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROVIDER_SNAPSHOTS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("date").greater_than_or_equal(since.clone()),
                    q.field("date").less_than(before.clone()),
                ])
            })
            .order_by([("date", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_daily_scores(
        &self,
        user_id: u64,
        since: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<DailyScore>> {
        let since = since.to_string();
        let before = before.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::DAILY_SCORES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("date").greater_than_or_equal(since.clone()),
                    q.field("date").less_than(before.clone()),
                ])
            })
            .order_by([("date", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl UserStore for FirestoreDb {
    async fn ensure_user(&self, user_id: u64) -> Result<User> {
        let existing = self.get_user(user_id).await?;
        let is_new = existing.is_none();
        let user = touched_user(existing, user_id, Utc::now());

        self.put_doc(collections::USERS, &user_id.to_string(), &user)
            .await?;

        if is_new {
            tracing::info!(user_id, "New user registered");
        }
        Ok(user)
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<User>> {
        self.get_doc(collections::USERS, &user_id.to_string()).await
    }

    async fn list_user_ids(&self) -> Result<Vec<u64>> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().map(|u| u.user_id).collect())
    }
}
