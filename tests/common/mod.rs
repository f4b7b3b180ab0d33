// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chatvibes_api::config::Config;
use chatvibes_api::db::FirestoreDb;
use chatvibes_api::middleware::auth::create_session_token;
use chatvibes_api::middleware::{SessionScope, SessionUser};
use chatvibes_api::routes::create_router;
use chatvibes_api::services::KmsService;
use chatvibes_api::AppState;
use std::sync::Arc;

/// Twitch user ID of the default test streamer.
#[allow(dead_code)]
pub const STREAMER_ID: &str = "1234";
#[allow(dead_code)]
pub const STREAMER_LOGIN: &str = "TestStreamer";

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

/// Create a test app backed by the in-memory store and mock KMS.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

/// Same as [`create_test_app`] with a caller-supplied config.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        config,
        FirestoreDb::new_in_memory(),
        KmsService::new_mock(),
    ));
    (create_router(state.clone()), state)
}

/// Session token signed with the app's key.
#[allow(dead_code)]
pub fn session_token(state: &AppState, user_id: &str, login: &str, scope: SessionScope) -> String {
    let user = SessionUser {
        user_id: user_id.to_string(),
        user_login: login.to_string(),
        display_name: login.to_string(),
        scope,
    };
    create_session_token(&user, &state.config.jwt_secret)
        .unwrap()
        .0
}

#[allow(dead_code)]
pub fn streamer_token(state: &AppState) -> String {
    session_token(state, STREAMER_ID, STREAMER_LOGIN, SessionScope::Streamer)
}

#[allow(dead_code)]
pub fn viewer_token(state: &AppState) -> String {
    session_token(state, "5678", "SomeViewer", SessionScope::Viewer)
}

/// Authenticated request; `body` is sent as JSON when present.
#[allow(dead_code)]
pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
