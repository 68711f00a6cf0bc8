// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Form, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vitals_tracker::config::Config;
use vitals_tracker::db::{FirestoreDb, MemoryDb};
use vitals_tracker::models::{OAuthToken, Provider};
use vitals_tracker::routes::create_router;
use vitals_tracker::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Generate a unique user ID for test isolation.
#[allow(dead_code)]
pub fn unique_user_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// Create a test app on in-memory storage.
/// Returns the router, the shared state and the backing store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    let db = Arc::new(MemoryDb::new());
    let state = Arc::new(AppState::build(config, db.clone()).expect("Failed to build state"));
    (create_router(state.clone()), state, db)
}

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_fake_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Point both providers' token and API endpoints at `base_url`.
///
/// Token endpoints become `{base}/{provider}/token`, API bases
/// `{base}/{provider}`.
#[allow(dead_code)]
pub fn config_with_fake(base_url: &str) -> Config {
    let mut config = Config::test_default();
    for provider in [&mut config.whoop, &mut config.oura] {
        provider.token_url = format!("{}/{}/token", base_url, provider.provider);
        provider.api_base = format!("{}/{}", base_url, provider.provider);
    }
    config
}

/// Token record expiring `expires_in_secs` from now.
#[allow(dead_code)]
pub fn stored_token(
    user_id: u64,
    provider: Provider,
    access: &str,
    refresh: Option<&str>,
    expires_in_secs: i64,
) -> OAuthToken {
    let now = Utc::now();
    OAuthToken {
        user_id,
        provider,
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: now + Duration::seconds(expires_in_secs),
        updated_at: now,
    }
}

/// `Authorization` header value for a session of `user_id`.
#[allow(dead_code)]
pub fn bearer(state: &AppState, user_id: u64) -> String {
    let jwt = vitals_tracker::middleware::auth::create_jwt(user_id, &state.config.jwt_signing_key)
        .unwrap();
    format!("Bearer {}", jwt)
}

// ─── Fake OAuth Token Endpoint ───────────────────────────────

/// One request seen by the fake token endpoint.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub provider: String,
    pub form: HashMap<String, String>,
    pub authorization: Option<String>,
}

/// Scriptable token endpoint for both providers.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FakeTokenServer {
    pub calls: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<TokenRequest>>>,
    /// Answer every grant with `400 invalid_grant`.
    pub reject: bool,
    /// Include a new refresh token in responses.
    pub rotate_refresh: bool,
    /// Delay before answering, to widen race windows.
    pub delay_ms: u64,
}

#[allow(dead_code)]
impl FakeTokenServer {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/{provider}/token", post(fake_token))
            .with_state(self.clone())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TokenRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

async fn fake_token(
    State(fake): State<FakeTokenServer>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let n = fake.calls.fetch_add(1, Ordering::SeqCst) + 1;
    fake.requests.lock().unwrap().push(TokenRequest {
        provider: provider.clone(),
        form,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    });

    if fake.delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(fake.delay_ms)).await;
    }

    if fake.reject {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        );
    }

    let mut body = json!({
        "access_token": format!("{}-access-{}", provider, n),
        "expires_in": 3600,
        "token_type": "bearer"
    });
    if fake.rotate_refresh {
        body["refresh_token"] = json!(format!("{}-refresh-{}", provider, n));
    }
    (StatusCode::OK, Json(body))
}
