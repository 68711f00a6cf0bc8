// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential lifecycle tests against a fake token endpoint.

use std::sync::Arc;
use vitals_tracker::db::{CredentialStore, MemoryDb};
use vitals_tracker::error::AppError;
use vitals_tracker::models::{OAuthState, Provider};
use vitals_tracker::services::CredentialManager;

mod common;
use common::{config_with_fake, spawn_fake_server, stored_token, FakeTokenServer};

async fn new_manager(fake: &FakeTokenServer) -> (CredentialManager, Arc<MemoryDb>) {
    let base = spawn_fake_server(fake.router()).await;
    let db = Arc::new(MemoryDb::new());
    let manager = CredentialManager::new(&config_with_fake(&base), db.clone(), reqwest::Client::new());
    (manager, db)
}

/// Pull the `state` query parameter out of an authorization URL.
fn state_param(url: &str) -> String {
    url.split('&')
        .find_map(|pair| pair.strip_prefix("state="))
        .expect("authorization URL carries a state")
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTHORIZATION FLOW
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_begin_authorization_records_state() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;

    let url = manager.begin_authorization(7, Provider::Whoop).await.unwrap();

    assert!(url.contains("client_id=whoop_client_id"));
    assert!(url.contains("response_type=code"));
    let state = state_param(&url);
    assert_eq!(state.len(), 43, "32 random bytes, unpadded URL-safe base64");
    assert!(!state.contains('+') && !state.contains('/') && !state.contains('='));

    let stored = db.take_state(&state).await.unwrap().unwrap();
    assert_eq!(stored.user_id, 7);
    assert_eq!(stored.provider, Provider::Whoop);
}

#[tokio::test]
async fn test_states_are_unique() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;

    let a = manager.begin_authorization(1, Provider::Oura).await.unwrap();
    let b = manager.begin_authorization(1, Provider::Oura).await.unwrap();

    assert_ne!(state_param(&a), state_param(&b));
    assert_eq!(db.state_count(), 2);
}

#[tokio::test]
async fn test_complete_authorization_stores_token_once() {
    let fake = FakeTokenServer {
        rotate_refresh: true,
        ..Default::default()
    };
    let (manager, db) = new_manager(&fake).await;

    let url = manager.begin_authorization(7, Provider::Whoop).await.unwrap();
    let state = state_param(&url);

    let authorized = manager.complete_authorization(&state, "code-123").await.unwrap();
    assert_eq!(authorized.user_id, 7);
    assert_eq!(authorized.provider, Provider::Whoop);

    let token = db.get_token(7, Provider::Whoop).await.unwrap().unwrap();
    assert_eq!(token.access_token, "whoop-access-1");
    assert_eq!(token.refresh_token.as_deref(), Some("whoop-refresh-1"));

    // Whoop takes client credentials in the form body.
    let request = fake.last_request().unwrap();
    assert_eq!(request.form["grant_type"], "authorization_code");
    assert_eq!(request.form["code"], "code-123");
    assert_eq!(request.form["client_id"], "whoop_client_id");
    assert_eq!(request.form["client_secret"], "whoop_client_secret");
    assert_eq!(
        request.form["redirect_uri"],
        "http://localhost:8080/callback/whoop"
    );
    assert!(request.authorization.is_none());

    // Replaying the same state is rejected without another exchange.
    let replay = manager.complete_authorization(&state, "code-123").await;
    assert!(matches!(replay, Err(AppError::InvalidState)));
    assert_eq!(fake.call_count(), 1);
}

#[tokio::test]
async fn test_oura_exchange_uses_basic_auth() {
    let fake = FakeTokenServer::default();
    let (manager, _db) = new_manager(&fake).await;

    let url = manager.begin_authorization(3, Provider::Oura).await.unwrap();
    manager
        .complete_authorization(&state_param(&url), "oura-code")
        .await
        .unwrap();

    let request = fake.last_request().unwrap();
    assert!(request.authorization.unwrap().starts_with("Basic "));
    assert!(!request.form.contains_key("client_secret"));
}

#[tokio::test]
async fn test_failed_exchange_still_consumes_state() {
    let fake = FakeTokenServer {
        reject: true,
        ..Default::default()
    };
    let (manager, db) = new_manager(&fake).await;

    let url = manager.begin_authorization(7, Provider::Oura).await.unwrap();
    let state = state_param(&url);

    let first = manager.complete_authorization(&state, "code").await;
    match first {
        Err(e @ AppError::TokenExchange { .. }) => assert!(e.requires_reauthorization()),
        other => panic!("expected token exchange failure, got {:?}", other),
    }
    assert!(db.get_token(7, Provider::Oura).await.unwrap().is_none());

    let second = manager.complete_authorization(&state, "code").await;
    assert!(matches!(second, Err(AppError::InvalidState)));
}

#[tokio::test]
async fn test_unknown_state_rejected() {
    let fake = FakeTokenServer::default();
    let (manager, _db) = new_manager(&fake).await;

    for state in ["", "never-issued"] {
        let result = manager.complete_authorization(state, "code").await;
        assert!(matches!(result, Err(AppError::InvalidState)));
    }
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_state_bound_to_provider() {
    let fake = FakeTokenServer::default();
    let (manager, _db) = new_manager(&fake).await;

    let url = manager.begin_authorization(7, Provider::Whoop).await.unwrap();
    let state = state_param(&url);

    let result = manager
        .complete_authorization_for(Provider::Oura, &state, "code")
        .await;
    assert!(matches!(result, Err(AppError::InvalidState)));
    assert_eq!(fake.call_count(), 0);

    // The mismatched attempt burned the state.
    let retry = manager
        .complete_authorization_for(Provider::Whoop, &state, "code")
        .await;
    assert!(matches!(retry, Err(AppError::InvalidState)));
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKEN REFRESH
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_missing_token_is_none() {
    let fake = FakeTokenServer::default();
    let (manager, _db) = new_manager(&fake).await;

    let token = manager.get_valid_access_token(1, Provider::Whoop).await.unwrap();
    assert_eq!(token, None);
}

#[tokio::test]
async fn test_token_outside_margin_returned_unchanged() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;
    db.set_token(&stored_token(1, Provider::Whoop, "current", Some("r"), 61))
        .await
        .unwrap();

    let token = manager.get_valid_access_token(1, Provider::Whoop).await.unwrap();

    assert_eq!(token.as_deref(), Some("current"));
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_token_inside_margin_refreshed() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;
    db.set_token(&stored_token(1, Provider::Whoop, "current", Some("r-old"), 59))
        .await
        .unwrap();

    let token = manager.get_valid_access_token(1, Provider::Whoop).await.unwrap();

    assert_eq!(token.as_deref(), Some("whoop-access-1"));
    let request = fake.last_request().unwrap();
    assert_eq!(request.form["grant_type"], "refresh_token");
    assert_eq!(request.form["refresh_token"], "r-old");

    // No refresh token in the response: the old one is kept.
    let stored = db.get_token(1, Provider::Whoop).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "whoop-access-1");
    assert_eq!(stored.refresh_token.as_deref(), Some("r-old"));
    assert!(stored.expires_at > chrono::Utc::now() + chrono::Duration::seconds(3000));
}

#[tokio::test]
async fn test_expired_token_refreshed_with_rotation() {
    let fake = FakeTokenServer {
        rotate_refresh: true,
        ..Default::default()
    };
    let (manager, db) = new_manager(&fake).await;
    db.set_token(&stored_token(2, Provider::Oura, "stale", Some("r-old"), -600))
        .await
        .unwrap();

    let token = manager.get_valid_access_token(2, Provider::Oura).await.unwrap();

    assert_eq!(token.as_deref(), Some("oura-access-1"));
    let stored = db.get_token(2, Provider::Oura).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("oura-refresh-1"));
}

#[tokio::test]
async fn test_rejected_refresh_returns_none() {
    let fake = FakeTokenServer {
        reject: true,
        ..Default::default()
    };
    let (manager, db) = new_manager(&fake).await;
    db.set_token(&stored_token(1, Provider::Whoop, "stale", Some("revoked"), 10))
        .await
        .unwrap();

    let token = manager.get_valid_access_token(1, Provider::Whoop).await.unwrap();
    assert_eq!(token, None);

    let status = manager.connection_status(1).await.unwrap();
    assert!(status.iter().all(|s| !s.connected));
}

#[tokio::test]
async fn test_expiring_token_without_refresh_token_is_none() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;
    db.set_token(&stored_token(1, Provider::Oura, "stale", None, 5))
        .await
        .unwrap();

    assert_eq!(
        manager.get_valid_access_token(1, Provider::Oura).await.unwrap(),
        None
    );
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let fake = FakeTokenServer {
        delay_ms: 100,
        ..Default::default()
    };
    let (manager, db) = new_manager(&fake).await;
    db.set_token(&stored_token(9, Provider::Whoop, "stale", Some("r"), 10))
        .await
        .unwrap();

    let manager = Arc::new(manager);
    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.get_valid_access_token(9, Provider::Whoop).await
        }));
    }

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.as_deref(), Some("whoop-access-1"));
    }
    assert_eq!(fake.call_count(), 1);
}

#[tokio::test]
async fn test_explicit_refresh() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;

    assert_eq!(manager.refresh(4, Provider::Oura).await.unwrap(), None);

    db.set_token(&stored_token(4, Provider::Oura, "fresh", Some("r"), 3600))
        .await
        .unwrap();
    let token = manager.refresh(4, Provider::Oura).await.unwrap();
    assert_eq!(token.as_deref(), Some("oura-access-1"));
}

// ═══════════════════════════════════════════════════════════════════════════
// MAINTENANCE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_purge_expired_states() {
    let fake = FakeTokenServer::default();
    let (manager, db) = new_manager(&fake).await;

    db.save_state(&OAuthState {
        token: "abandoned".to_string(),
        provider: Provider::Whoop,
        user_id: 1,
        created_at: chrono::Utc::now() - chrono::Duration::hours(2),
    })
    .await
    .unwrap();
    manager.begin_authorization(1, Provider::Oura).await.unwrap();

    assert_eq!(manager.purge_expired_states().await.unwrap(), 1);
    assert_eq!(db.state_count(), 1);
}
