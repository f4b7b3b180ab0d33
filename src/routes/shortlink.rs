// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shortlink creation and redirect routes.

use crate::error::{AppError, Result};
use crate::middleware::SessionUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use url::Url;
use validator::Validate;

/// Longest URL accepted for shortening.
const MAX_URL_LENGTH: u64 = 2048;

/// Public redirect route.
pub fn redirect_routes() -> Router<Arc<AppState>> {
    Router::new().route("/s/{slug}", get(follow_shortlink))
}

/// Authenticated creation route.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/shortlink", post(create_shortlink))
}

#[derive(Deserialize, Validate)]
pub struct CreateShortlinkRequest {
    #[serde(default)]
    #[validate(length(max = MAX_URL_LENGTH))]
    pub url: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct CreateShortlinkResponse {
    pub success: bool,
    pub slug: String,
    pub short_url: String,
    pub absolute_url: String,
}

async fn create_shortlink(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(mut request): Json<CreateShortlinkRequest>,
) -> Result<Json<CreateShortlinkResponse>> {
    request.url = request.url.trim().to_string();
    if request.url.is_empty() {
        return Err(AppError::BadRequest("URL is required".to_string()));
    }
    request.validate()?;

    // Stored form is the parser's serialization, free of tabs and newlines.
    let target = Url::parse(&request.url)
        .map_err(|_| AppError::BadRequest("A valid absolute URL is required".to_string()))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(AppError::BadRequest(
            "Only http and https URLs can be shortened".to_string(),
        ));
    }

    let created = state
        .shortlinks
        .create(target.as_str(), Some(user.user_login.clone()))
        .await?;

    Ok(Json(CreateShortlinkResponse {
        success: true,
        slug: created.slug,
        short_url: created.short_url,
        absolute_url: created.absolute_url,
    }))
}

/// Redirect to the stored URL with a permanent (301) redirect.
async fn follow_shortlink(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response> {
    match state.shortlinks.follow(&slug).await? {
        Some(url) => {
            let location = HeaderValue::from_str(&url).map_err(|_| {
                AppError::Internal(anyhow::anyhow!("Shortlink {} has an unusable target", slug))
            })?;
            tracing::debug!(slug = %slug, "Shortlink followed");
            Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response())
        }
        None => Ok((StatusCode::NOT_FOUND, "Short link not found").into_response()),
    }
}
