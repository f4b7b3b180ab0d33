// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Twitch OAuth login, logout, and session status routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_session_token, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::middleware::{SessionScope, SessionUser};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// OAuth `state` older than this is rejected (10 minutes).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;
/// Tolerated clock skew for `state` timestamps from the future.
const STATE_MAX_SKEW_MS: u128 = 60 * 1000;

/// Public login/logout routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/twitch/initiate", get(auth_initiate))
        .route("/auth/twitch/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Session routes (mounted behind the auth middleware).
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/refresh", post(auth_refresh))
}

// ─── OAuth Flow ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct InitiateParams {
    #[serde(default)]
    scope: Option<String>,
}

/// Start OAuth flow - redirect to Twitch authorization.
async fn auth_initiate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InitiateParams>,
) -> Result<Redirect> {
    let scope = match params.scope.as_deref() {
        None | Some("streamer") => SessionScope::Streamer,
        Some("viewer") => SessionScope::Viewer,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Unknown login scope '{}'",
                other
            )))
        }
    };

    let oauth_state = sign_state(scope, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state.twitch.authorize_url(scope, &oauth_state);

    tracing::info!(scope = scope.as_str(), "Starting OAuth flow, redirecting to Twitch");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth callback - exchange code, issue session, hand off to the dashboard.
///
/// Failures redirect to the dashboard with an `error` query parameter.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend_url = state.config.frontend_url.trim_end_matches('/');

    if let Some(error) = params.error {
        tracing::warn!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "OAuth error from Twitch"
        );
        return (jar, error_redirect(frontend_url, &error));
    }

    let now = match now_millis() {
        Ok(now) => now,
        Err(_) => return (jar, error_redirect(frontend_url, "server_error")),
    };
    let scope = match params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key, now))
    {
        Some(scope) => scope,
        None => {
            tracing::warn!("Invalid, expired, or tampered OAuth state parameter");
            return (jar, error_redirect(frontend_url, "invalid_state"));
        }
    };

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (jar, error_redirect(frontend_url, "missing_code"));
    };

    match complete_login(&state, &code, scope).await {
        Ok(token) => {
            let redirect = format!(
                "{}/auth-complete.html?session_token={}&scope={}",
                frontend_url,
                urlencoding::encode(&token),
                scope.as_str()
            );
            let jar = jar.add(session_cookie(&state.config, token));
            (jar, Redirect::temporary(&redirect))
        }
        Err(e) => {
            tracing::error!(error = %e, scope = scope.as_str(), "OAuth login failed");
            (jar, error_redirect(frontend_url, "login_failed"))
        }
    }
}

async fn complete_login(state: &AppState, code: &str, scope: SessionScope) -> Result<String> {
    let twitch_user = state.twitch.handle_oauth_callback(code, scope).await?;

    let user = SessionUser {
        user_id: twitch_user.id,
        user_login: twitch_user.login,
        display_name: twitch_user.display_name,
        scope,
    };
    let (token, _) = create_session_token(&user, &state.config.jwt_secret)?;

    tracing::info!(user_login = %user.user_login, scope = scope.as_str(), "Session issued");
    Ok(token)
}

/// Logout - clear the session cookie and return to the dashboard.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::temporary(&state.config.frontend_url))
}

fn error_redirect(frontend_url: &str, error: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/?error={}",
        frontend_url,
        urlencoding::encode(error)
    ))
}

/// HttpOnly session cookie; `Secure` except for local development frontends.
fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    let local = super::is_local_dev_url(&config.frontend_url);

    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(!local)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}

// ─── OAuth State ─────────────────────────────────────────────

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn state_signature(payload: &str, key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Build a signed OAuth state: base64url of `scope|timestamp_hex|signature_hex`.
pub fn sign_state(scope: SessionScope, timestamp_ms: u128, key: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", scope.as_str(), timestamp_ms);
    let signature = state_signature(&payload, key)?;
    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify an OAuth state and recover its login scope.
pub fn verify_state(state: &str, key: &[u8], now_ms: u128) -> Option<SessionScope> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let mut parts = state_str.splitn(3, '|');
    let (scope, timestamp_hex, signature_hex) = (parts.next()?, parts.next()?, parts.next()?);

    let payload = format!("{}|{}", scope, timestamp_hex);
    let expected = state_signature(&payload, key).ok()?;
    let provided = hex::decode(signature_hex).ok()?;
    if !bool::from(expected.ct_eq(&provided)) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if timestamp > now_ms + STATE_MAX_SKEW_MS || now_ms.saturating_sub(timestamp) > STATE_MAX_AGE_MS
    {
        tracing::warn!(timestamp_ms = %timestamp, "OAuth state expired");
        return None;
    }

    match scope {
        "streamer" => Some(SessionScope::Streamer),
        "viewer" => Some(SessionScope::Viewer),
        _ => None,
    }
}

// ─── Session Status ──────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TwitchTokenStatus {
    pub needs_twitch_re_auth: bool,
    pub expires_at: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub user: SessionUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitch_token_status: Option<TwitchTokenStatus>,
}

/// Current session identity, plus Twitch credential health for streamers.
async fn auth_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<AuthStatusResponse>> {
    let twitch_token_status = match user.scope {
        SessionScope::Streamer => state
            .db
            .get_managed_channel(&user.channel_login())
            .await?
            .map(|channel| TwitchTokenStatus {
                needs_twitch_re_auth: channel.needs_twitch_re_auth,
                expires_at: channel.twitch_access_token_expires_at,
            }),
        SessionScope::Viewer => None,
    };

    Ok(Json(AuthStatusResponse {
        success: true,
        user,
        twitch_token_status,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitch_token_expires_at: Option<String>,
}

/// Re-issue the session token; streamers also get a forced Twitch refresh.
async fn auth_refresh(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<RefreshResponse>> {
    let twitch_token_expires_at = match user.scope {
        SessionScope::Streamer => {
            let expires_at = state.twitch.force_refresh(&user.user_id).await?;
            Some(format_utc_rfc3339(expires_at))
        }
        SessionScope::Viewer => None,
    };

    let (token, expires_at) = create_session_token(&user, &state.config.jwt_secret)?;
    tracing::info!(user_login = %user.user_login, "Session refreshed");

    Ok(Json(RefreshResponse {
        success: true,
        token,
        expires_at: format_utc_rfc3339(expires_at),
        twitch_token_expires_at,
    }))
}
