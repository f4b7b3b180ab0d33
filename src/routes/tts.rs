// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TTS test and channel configuration routes.

use crate::error::{AppError, Result};
use crate::middleware::SessionUser;
use crate::models::{TtsChannelConfig, TtsUserPreferences, VoiceSettings};
use crate::services::tts::NOT_CONFIGURED;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Longest text accepted by the test endpoint, in characters.
pub const MAX_TEXT_CHARS: usize = 500;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tts/test", post(tts_test))
        .route("/api/tts/config", get(get_config).put(put_config))
}

// ─── Test Synthesis ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct TtsTestRequest {
    #[serde(default)]
    pub text: String,
    /// Per-request voice overrides
    #[serde(flatten)]
    pub voice: TtsUserPreferences,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TtsTestResponse {
    pub success: bool,
    pub audio_url: String,
}

/// Synthesize a sample with the caller's channel voice.
async fn tts_test(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<TtsTestRequest>,
) -> Result<Json<TtsTestResponse>> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Text is required".to_string()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Text must be at most {} characters",
            MAX_TEXT_CHARS
        )));
    }
    if !state.tts.is_configured() {
        return Err(AppError::NotConfigured(NOT_CONFIGURED.to_string()));
    }
    request.voice.validate()?;

    let login = user.channel_login();
    let channel = state
        .db
        .get_tts_channel_config(&login)
        .await?
        .unwrap_or_default();

    let mut voice = VoiceSettings::from(&channel);
    if channel.allow_viewer_preferences {
        if let Some(prefs) = state.db.get_tts_user_preferences(&login).await? {
            voice = voice.apply(&prefs);
        }
    }
    let voice = voice.apply(&request.voice);

    tracing::info!(
        user_login = %user.user_login,
        voice_id = %voice.voice_id,
        chars = text.chars().count(),
        "TTS test requested"
    );
    let audio_url = state.tts.synthesize(text, &voice).await?;

    Ok(Json(TtsTestResponse {
        success: true,
        audio_url,
    }))
}

// ─── Channel Configuration ───────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TtsConfigResponse {
    pub success: bool,
    pub config: TtsChannelConfig,
}

/// Get the caller's channel TTS configuration (defaults if never saved).
async fn get_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<TtsConfigResponse>> {
    user.require_streamer()?;

    let config = state
        .db
        .get_tts_channel_config(&user.channel_login())
        .await?
        .unwrap_or_default();

    Ok(Json(TtsConfigResponse {
        success: true,
        config,
    }))
}

/// Replace the caller's channel TTS configuration.
async fn put_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(mut config): Json<TtsChannelConfig>,
) -> Result<Json<TtsConfigResponse>> {
    user.require_streamer()?;
    config.validate()?;

    config.updated_at = Some(now_rfc3339());
    state
        .db
        .set_tts_channel_config(&user.channel_login(), &config)
        .await?;
    tracing::info!(channel = %user.channel_login(), "TTS channel config updated");

    Ok(Json(TtsConfigResponse {
        success: true,
        config,
    }))
}
