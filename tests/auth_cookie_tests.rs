// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth redirect and session cookie tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    routing::{get as get_route, post},
    Json, Router,
};
use chatvibes_api::config::Config;
use chatvibes_api::middleware::auth::SESSION_COOKIE;
use chatvibes_api::middleware::SessionScope;
use chatvibes_api::models::ManagedChannel;
use chatvibes_api::routes::auth::sign_state;
use chatvibes_api::services::KmsService;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;
use common::{STREAMER_ID, STREAMER_LOGIN};

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}

fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

async fn get(uri: &str) -> Response {
    let (app, _) = common::create_test_app();
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_initiate_redirects_to_twitch_with_signed_state() {
    let response = get("/auth/twitch/initiate?scope=viewer").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let url = location(&response);
    assert!(url.contains("/oauth2/authorize?client_id=test_client_id"));
    assert!(url.contains("scope=user%3Aread%3Aemail&"));
    assert!(!url.contains("moderators"));
    assert!(url.contains("state="));
}

#[tokio::test]
async fn test_initiate_defaults_to_streamer_scopes() {
    let response = get("/auth/twitch/initiate").await;
    assert!(location(&response).contains("channel%3Amanage%3Amoderators"));
}

#[tokio::test]
async fn test_initiate_rejects_unknown_scope() {
    let response = get("/auth/twitch/initiate?scope=admin").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_provider_error_redirects_to_frontend() {
    let response = get("/auth/twitch/callback?error=access_denied&state=x").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:5173/?error=access_denied");
    assert!(set_cookie_headers(&response).is_empty());
}

#[tokio::test]
async fn test_callback_with_tampered_state_is_refused() {
    let response = get("/auth/twitch/callback?code=abc&state=dGFtcGVyZWQ").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:5173/?error=invalid_state");
    assert!(set_cookie_headers(&response).is_empty());
}

#[tokio::test]
async fn test_logout_clears_session_cookie() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/logout")
                .header(header::COOKIE, format!("{}=token", SESSION_COOKIE))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:5173");

    let cookies = set_cookie_headers(&response);
    let session = cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", SESSION_COOKIE)))
        .unwrap_or_else(|| panic!("missing session removal cookie: {cookies:?}"));
    assert!(session.contains("Path=/"));
    assert!(session.contains("Max-Age=0"));
}

// ─── Successful login ────────────────────────────────────────

async fn mock_token() -> Json<Value> {
    Json(json!({
        "access_token": "callback-access",
        "refresh_token": "callback-refresh",
        "expires_in": 14400,
        "scope": ["user:read:email", "channel:manage:moderators"],
        "token_type": "bearer"
    }))
}

async fn mock_users() -> Json<Value> {
    Json(json!({
        "data": [{"id": STREAMER_ID, "login": "teststreamer", "display_name": STREAMER_LOGIN}]
    }))
}

async fn spawn_mock_twitch() -> Config {
    let app = Router::new()
        .route("/oauth2/token", post(mock_token))
        .route("/helix/users", get_route(mock_users));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = Config::test_default();
    config.twitch_api_base_url = format!("http://{}/helix", addr);
    config.twitch_auth_base_url = format!("http://{}/oauth2", addr);
    config
}

#[tokio::test]
async fn test_streamer_callback_issues_session_and_stores_tokens() {
    let config = spawn_mock_twitch().await;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    let oauth_state = sign_state(SessionScope::Streamer, now_ms, &config.oauth_state_key).unwrap();
    let (app, state) = common::create_test_app_with(config);

    let mut flagged = ManagedChannel::new(STREAMER_ID, STREAMER_LOGIN);
    flagged.needs_twitch_re_auth = true;
    state.db.upsert_managed_channel(&flagged).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/auth/twitch/callback?code=good-code&state={}",
                    oauth_state
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let url = location(&response);
    let prefix = "http://localhost:5173/auth-complete.html?session_token=";
    assert!(url.starts_with(prefix), "unexpected redirect {url}");
    assert!(url.ends_with("&scope=streamer"));
    let session_token = url[prefix.len()..url.len() - "&scope=streamer".len()].to_string();

    let cookies = set_cookie_headers(&response);
    let session = cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}={}", SESSION_COOKIE, session_token)))
        .unwrap_or_else(|| panic!("missing session cookie: {cookies:?}"));
    assert!(session.contains("HttpOnly"));
    assert!(session.contains("SameSite=Lax"));

    // Tokens are stored encrypted and bound to the user ID.
    let stored = state.db.get_twitch_tokens(STREAMER_ID).await.unwrap().unwrap();
    assert_ne!(stored.access_token_encrypted, "callback-access");
    assert!(stored.has_scope("channel:manage:moderators"));
    let kms = KmsService::new_mock();
    assert_eq!(
        kms.decrypt(&stored.refresh_token_encrypted, STREAMER_ID.as_bytes())
            .await
            .unwrap(),
        "callback-refresh"
    );

    let channel = state
        .db
        .get_managed_channel(STREAMER_LOGIN)
        .await
        .unwrap()
        .unwrap();
    assert!(!channel.needs_twitch_re_auth);

    // The issued session is accepted by the API.
    let response = app
        .oneshot(common::authed_request("GET", "/api/auth/status", &session_token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["user"]["userId"], STREAMER_ID);
    assert_eq!(body["user"]["scope"], "streamer");
}
