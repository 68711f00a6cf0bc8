// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process storage backend for local development and tests.
//!
//! Each collection is a `DashMap` keyed by the same document IDs Firestore
//! uses, so per-key writes serialize on the map shard and same-key upserts
//! overwrite.

use crate::db::{touched_user, CredentialStore, MetricsStore, UserStore};
use crate::error::Result;
use crate::models::{DailyScore, OAuthState, OAuthToken, Provider, ProviderSnapshot, User};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Shared in-memory database. Clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<u64, User>>,
    states: Arc<DashMap<String, OAuthState>>,
    tokens: Arc<DashMap<String, OAuthToken>>,
    snapshots: Arc<DashMap<String, ProviderSnapshot>>,
    scores: Arc<DashMap<String, DailyScore>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots (all users, all providers).
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Number of stored daily score rows.
    pub fn daily_score_count(&self) -> usize {
        self.scores.len()
    }

    /// Number of pending OAuth states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn save_state(&self, state: &OAuthState) -> Result<()> {
        self.states.insert(state.token.clone(), state.clone());
        Ok(())
    }

    async fn take_state(&self, token: &str) -> Result<Option<OAuthState>> {
        Ok(self.states.remove(token).map(|(_, state)| state))
    }

    async fn purge_states_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let before = self.states.len();
        self.states.retain(|_, state| state.created_at >= cutoff);
        Ok(before.saturating_sub(self.states.len()))
    }

    async fn get_token(&self, user_id: u64, provider: Provider) -> Result<Option<OAuthToken>> {
        Ok(self
            .tokens
            .get(&OAuthToken::key(user_id, provider))
            .map(|entry| entry.value().clone()))
    }

    async fn set_token(&self, token: &OAuthToken) -> Result<()> {
        self.tokens.insert(
            OAuthToken::key(token.user_id, token.provider),
            token.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for MemoryDb {
    async fn upsert_snapshot(&self, snapshot: &ProviderSnapshot) -> Result<()> {
        self.snapshots
            .insert(snapshot.document_id(), snapshot.clone());
        Ok(())
    }

    async fn upsert_daily_score(&self, score: &DailyScore) -> Result<()> {
        self.scores.insert(score.document_id(), score.clone());
        Ok(())
    }

    async fn get_snapshot(
        &self,
        user_id: u64,
        provider: Provider,
        date: NaiveDate,
    ) -> Result<Option<ProviderSnapshot>> {
        Ok(self
            .snapshots
            .get(&ProviderSnapshot::key(user_id, provider, date))
            .map(|entry| entry.value().clone()))
    }

    async fn get_daily_score(&self, user_id: u64, date: NaiveDate) -> Result<Option<DailyScore>> {
        Ok(self
            .scores
            .get(&DailyScore::key(user_id, date))
            .map(|entry| entry.value().clone()))
    }

    async fn list_snapshots(
        &self,
        user_id: u64,
        since: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<ProviderSnapshot>> {
        let mut rows: Vec<ProviderSnapshot> = self
            .snapshots
            .iter()
            .filter(|e| e.user_id == user_id && e.date >= since && e.date < before)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn list_daily_scores(
        &self,
        user_id: u64,
        since: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<DailyScore>> {
        let mut rows: Vec<DailyScore> = self
            .scores
            .iter()
            .filter(|e| e.user_id == user_id && e.date >= since && e.date < before)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn ensure_user(&self, user_id: u64) -> Result<User> {
        let now = Utc::now();
        let mut entry = self
            .users
            .entry(user_id)
            .or_insert_with(|| touched_user(None, user_id, now));
        entry.last_active = now;
        Ok(entry.value().clone())
    }

    async fn get_user(&self, user_id: u64) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn list_user_ids(&self) -> Result<Vec<u64>> {
        let mut ids: Vec<u64> = self.users.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
