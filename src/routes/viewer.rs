// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Viewer voice preference routes (any session scope).

use crate::error::Result;
use crate::middleware::SessionUser;
use crate::models::TtsUserPreferences;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/viewer/preferences",
        get(get_preferences).put(put_preferences),
    )
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesResponse {
    pub success: bool,
    pub preferences: TtsUserPreferences,
}

async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<PreferencesResponse>> {
    let preferences = state
        .db
        .get_tts_user_preferences(&user.user_login)
        .await?
        .unwrap_or_default();

    Ok(Json(PreferencesResponse {
        success: true,
        preferences,
    }))
}

async fn put_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(mut preferences): Json<TtsUserPreferences>,
) -> Result<Json<PreferencesResponse>> {
    preferences.validate()?;

    preferences.updated_at = Some(now_rfc3339());
    state
        .db
        .set_tts_user_preferences(&user.user_login, &preferences)
        .await?;
    tracing::info!(user_login = %user.user_login, "Viewer voice preferences updated");

    Ok(Json(PreferencesResponse {
        success: true,
        preferences,
    }))
}
