// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token (JWT) creation and authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_ISSUER: &str = "chatvibes-auth";
pub const SESSION_AUDIENCE: &str = "chatvibes-api";
/// Cookie carrying the session token for browser requests.
pub const SESSION_COOKIE: &str = "chatvibes_session";
/// Session lifetime: 7 days.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Privilege level of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionScope {
    /// Channel owner: may manage the bot and channel settings
    Streamer,
    /// Chat viewer: may manage personal preferences only
    Viewer,
}

impl SessionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionScope::Streamer => "streamer",
            SessionScope::Viewer => "viewer",
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Twitch user ID
    pub user_id: String,
    /// Twitch login
    pub user_login: String,
    pub display_name: String,
    pub scope: SessionScope,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub user_login: String,
    pub display_name: String,
    pub scope: SessionScope,
}

impl SessionUser {
    /// The channel this user owns (lowercase login).
    pub fn channel_login(&self) -> String {
        self.user_login.to_lowercase()
    }

    pub fn require_streamer(&self) -> Result<(), AppError> {
        match self.scope {
            SessionScope::Streamer => Ok(()),
            SessionScope::Viewer => Err(AppError::Forbidden(
                "Streamer login required for this action".to_string(),
            )),
        }
    }
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            user_login: claims.user_login,
            display_name: claims.display_name,
            scope: claims.scope,
        }
    }
}

/// Middleware that requires a valid session token.
///
/// The token is taken from `Authorization: Bearer` first, then from the
/// session cookie.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let token = match bearer {
        Some(t) if !t.is_empty() => t,
        _ => jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(AppError::Unauthorized)?,
    };

    let user = verify_session_token(&token, &state.config.jwt_secret)?;
    tracing::debug!(user_login = %user.user_login, scope = user.scope.as_str(), "Session verified");

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Verify signature, issuer, audience, and expiry of a session token.
pub fn verify_session_token(token: &str, secret: &[u8]) -> Result<SessionUser, AppError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[SESSION_ISSUER]);
    validation.set_audience(&[SESSION_AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::InvalidToken
    })?;

    Ok(token_data.claims.into())
}

/// Create a session token for a user. Returns the token and its expiry.
pub fn create_session_token(
    user: &SessionUser,
    secret: &[u8],
) -> anyhow::Result<(String, DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = now + chrono::Duration::seconds(SESSION_TTL_SECS);

    let claims = Claims {
        user_id: user.user_id.clone(),
        user_login: user.user_login.clone(),
        display_name: user.display_name.clone(),
        scope: user.scope,
        iss: SESSION_ISSUER.to_string(),
        aud: SESSION_AUDIENCE.to_string(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?;

    Ok((token, expires_at))
}
