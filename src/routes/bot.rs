// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bot activation routes.

use crate::error::Result;
use crate::middleware::SessionUser;
use crate::services::BotToggle;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/bot/status", get(bot_status))
        .route("/api/bot/add", post(bot_add))
        .route("/api/bot/remove", post(bot_remove))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct BotStatusResponse {
    pub success: bool,
    pub is_active: bool,
    pub channel_name: String,
    pub needs_twitch_re_auth: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct BotToggleResponse {
    pub success: bool,
    pub is_active: bool,
    pub channel_name: String,
    pub message: String,
}

impl BotToggleResponse {
    fn new(user: &SessionUser, outcome: BotToggle) -> Self {
        Self {
            success: true,
            is_active: matches!(outcome, BotToggle::Activated | BotToggle::AlreadyActive),
            channel_name: user.channel_login(),
            message: outcome.message().to_string(),
        }
    }
}

async fn bot_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<BotStatusResponse>> {
    let status = state.bot.status(&user).await?;

    Ok(Json(BotStatusResponse {
        success: true,
        is_active: status.is_active,
        channel_name: status.channel_name,
        needs_twitch_re_auth: status.needs_twitch_re_auth,
    }))
}

async fn bot_add(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<BotToggleResponse>> {
    let outcome = state.bot.activate(&user).await?;
    Ok(Json(BotToggleResponse::new(&user, outcome)))
}

async fn bot_remove(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<BotToggleResponse>> {
    let outcome = state.bot.deactivate(&user).await?;
    Ok(Json(BotToggleResponse::new(&user, outcome)))
}
