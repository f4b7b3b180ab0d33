// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TTS test endpoint, channel config, and viewer preference tests.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chatvibes_api::config::Config;
use chatvibes_api::models::TtsChannelConfig;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

mod common;

// ─── Mock TTS provider ───────────────────────────────────────

#[derive(Default)]
struct MockProvider {
    last_input: Mutex<Option<Value>>,
}

async fn create_prediction(
    State(mock): State<Arc<MockProvider>>,
    Path((_owner, _name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    *mock.last_input.lock().unwrap() = Some(body["input"].clone());
    // Still running after the synchronous wait; the client must poll.
    Json(json!({"id": "pred-1", "status": "processing", "output": null}))
}

async fn get_prediction(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "id": id,
        "status": "succeeded",
        "output": "https://replicate.delivery/pred-1/output.mp3"
    }))
}

async fn spawn_mock_provider() -> (Config, Arc<MockProvider>) {
    let mock = Arc::new(MockProvider::default());
    let app = Router::new()
        .route(
            "/v1/models/{owner}/{name}/predictions",
            post(create_prediction),
        )
        .route("/v1/predictions/{id}", get(get_prediction))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = Config::test_default();
    config.tts_api_base_url = format!("http://{}/v1", addr);
    config.tts_api_key = Some("r8_test_token".to_string());
    (config, mock)
}

/// Provider that holds the create request past the default client timeout,
/// as Replicate does while honoring `Prefer: wait`.
async fn spawn_slow_provider() -> Config {
    async fn slow_create() -> Json<Value> {
        tokio::time::sleep(std::time::Duration::from_secs(11)).await;
        Json(json!({
            "id": "pred-slow",
            "status": "succeeded",
            "output": ["https://replicate.delivery/pred-slow/output.mp3"]
        }))
    }

    let app = Router::new().route("/v1/models/{owner}/{name}/predictions", post(slow_create));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = Config::test_default();
    config.tts_api_base_url = format!("http://{}/v1", addr);
    config.tts_api_key = Some("r8_test_token".to_string());
    config
}

async fn call(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(common::authed_request(method, uri, token, body))
        .await
        .unwrap();
    let status = response.status();
    (status, common::body_json(response).await)
}

// ─── /api/tts/test ───────────────────────────────────────────

#[tokio::test]
async fn test_tts_without_provider_key_is_501() {
    let (app, state) = common::create_test_app();
    let token = common::streamer_token(&state);

    let (status, body) = call(
        &app,
        "POST",
        "/api/tts/test",
        &token,
        Some(json!({"text": "Hello world"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("TTS provider not configured"));
}

#[tokio::test]
async fn test_tts_rejects_empty_and_long_text() {
    let (app, state) = common::create_test_app();
    let token = common::streamer_token(&state);

    let (status, body) = call(&app, "POST", "/api/tts/test", &token, Some(json!({"text": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Text is required");

    let (status, _) = call(&app, "POST", "/api/tts/test", &token, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "a".repeat(501);
    let (status, _) = call(&app, "POST", "/api/tts/test", &token, Some(json!({"text": long}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tts_merges_channel_voice_with_overrides() {
    let (config, mock) = spawn_mock_provider().await;
    let (app, state) = common::create_test_app_with(config);
    let token = common::streamer_token(&state);

    let channel = TtsChannelConfig {
        voice_id: "Wise_Woman".to_string(),
        pitch: 2,
        ..Default::default()
    };
    state
        .db
        .set_tts_channel_config(common::STREAMER_LOGIN, &channel)
        .await
        .unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/api/tts/test",
        &token,
        Some(json!({"text": "  Hello world  ", "speed": 1.5})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["audioUrl"],
        "https://replicate.delivery/pred-1/output.mp3"
    );

    let input = mock.last_input.lock().unwrap().clone().unwrap();
    assert_eq!(input["text"], "Hello world");
    assert_eq!(input["voice_id"], "Wise_Woman");
    assert_eq!(input["pitch"], 2);
    assert_eq!(input["speed"], 1.5);
}

#[tokio::test]
async fn test_tts_waits_for_synchronous_prediction() {
    let config = spawn_slow_provider().await;
    let (app, state) = common::create_test_app_with(config);
    let token = common::streamer_token(&state);

    let (status, body) = call(
        &app,
        "POST",
        "/api/tts/test",
        &token,
        Some(json!({"text": "Hello world"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["audioUrl"],
        "https://replicate.delivery/pred-slow/output.mp3"
    );
}

#[tokio::test]
async fn test_tts_rejects_out_of_range_override() {
    let (config, _mock) = spawn_mock_provider().await;
    let (app, state) = common::create_test_app_with(config);
    let token = common::streamer_token(&state);

    let (status, _) = call(
        &app,
        "POST",
        "/api/tts/test",
        &token,
        Some(json!({"text": "Hi", "pitch": 40})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── /api/tts/config ─────────────────────────────────────────

#[tokio::test]
async fn test_channel_config_defaults_then_update() {
    let (app, state) = common::create_test_app();
    let token = common::streamer_token(&state);

    let (status, body) = call(&app, "GET", "/api/tts/config", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["engineEnabled"], false);
    assert_eq!(body["config"]["voiceId"], "Friendly_Person");

    let update = json!({
        "engineEnabled": true,
        "mode": "all",
        "voiceId": "Deep_Voice_Man",
        "speed": 1.25
    });
    let (status, body) = call(&app, "PUT", "/api/tts/config", &token, Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["config"]["updatedAt"].is_string());

    let (_, body) = call(&app, "GET", "/api/tts/config", &token, None).await;
    assert_eq!(body["config"]["engineEnabled"], true);
    assert_eq!(body["config"]["mode"], "all");
    assert_eq!(body["config"]["voiceId"], "Deep_Voice_Man");
    assert_eq!(body["config"]["emotion"], "auto");
}

#[tokio::test]
async fn test_channel_config_validation() {
    let (app, state) = common::create_test_app();
    let token = common::streamer_token(&state);

    for bad in [
        json!({"mode": "sometimes"}),
        json!({"speed": 0.1}),
        json!({"pitch": -13}),
    ] {
        let (status, body) = call(&app, "PUT", "/api/tts/config", &token, Some(bad.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {bad}");
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn test_viewer_cannot_edit_channel_config() {
    let (app, state) = common::create_test_app();
    let token = common::viewer_token(&state);

    let (status, _) = call(&app, "GET", "/api/tts/config", &token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &app,
        "PUT",
        "/api/tts/config",
        &token,
        Some(json!({"engineEnabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ─── /api/viewer/preferences ─────────────────────────────────

#[tokio::test]
async fn test_viewer_preferences_roundtrip() {
    let (app, state) = common::create_test_app();
    let token = common::viewer_token(&state);

    let (status, body) = call(&app, "GET", "/api/viewer/preferences", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["preferences"]["voiceId"].is_null());

    let (status, _) = call(
        &app,
        "PUT",
        "/api/viewer/preferences",
        &token,
        Some(json!({"voiceId": "Calm_Woman", "pitch": -2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = state
        .db
        .get_tts_user_preferences("someviewer")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.voice_id.as_deref(), Some("Calm_Woman"));
    assert_eq!(stored.pitch, Some(-2));
    assert!(stored.speed.is_none());
}

#[tokio::test]
async fn test_viewer_preferences_validation() {
    let (app, state) = common::create_test_app();
    let token = common::viewer_token(&state);

    let (status, body) = call(
        &app,
        "PUT",
        "/api/viewer/preferences",
        &token,
        Some(json!({"speed": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("speed"));
}
