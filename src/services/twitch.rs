// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Twitch API client and token lifecycle.
//!
//! Handles:
//! - OAuth code exchange and token refresh (id.twitch.tv)
//! - Helix user lookups and channel moderator add/remove
//! - Encrypted token storage with an in-memory access token cache

use crate::config::Config;
use crate::error::AppError;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Scope that lets the bot be added/removed as a channel moderator.
pub const MODERATOR_SCOPE: &str = "channel:manage:moderators";
/// Scopes requested for streamer logins.
pub const STREAMER_SCOPES: &[&str] = &["user:read:email", MODERATOR_SCOPE];
/// Scopes requested for viewer logins.
pub const VIEWER_SCOPES: &[&str] = &["user:read:email"];

const HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Twitch API client.
#[derive(Clone)]
pub struct TwitchClient {
    http: reqwest::Client,
    api_base_url: String,
    auth_base_url: String,
    client_id: String,
    client_secret: String,
}

impl TwitchClient {
    /// Create a client from configured credentials and endpoints.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_base_url: config.twitch_api_base_url.trim_end_matches('/').to_string(),
            auth_base_url: config.twitch_auth_base_url.trim_end_matches('/').to_string(),
            client_id: config.twitch_client_id.clone(),
            client_secret: config.twitch_client_secret.clone(),
        }
    }

    /// Build the user-facing authorization URL.
    pub fn authorize_url(&self, redirect_uri: &str, scopes: &[&str], state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.auth_base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TwitchTokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::TwitchApi(format!("Token exchange failed: {}", e)))?;

        parse_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TwitchTokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::TwitchApi(format!("Token refresh request failed: {}", e)))?;

        parse_json(response).await
    }

    /// Get the user that owns `access_token`.
    pub async fn get_current_user(&self, access_token: &str) -> Result<TwitchUser, AppError> {
        let response = self
            .helix(reqwest::Method::GET, "/users", access_token)
            .send()
            .await
            .map_err(|e| AppError::TwitchApi(e.to_string()))?;

        let users: HelixData<TwitchUser> = parse_json(response).await?;
        users
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::TwitchApi("Twitch returned no user for token".to_string()))
    }

    /// Resolve a login to a user.
    pub async fn get_user_by_login(
        &self,
        access_token: &str,
        login: &str,
    ) -> Result<Option<TwitchUser>, AppError> {
        let response = self
            .helix(reqwest::Method::GET, "/users", access_token)
            .query(&[("login", login.to_lowercase())])
            .send()
            .await
            .map_err(|e| AppError::TwitchApi(e.to_string()))?;

        let users: HelixData<TwitchUser> = parse_json(response).await?;
        Ok(users.data.into_iter().next())
    }

    /// Make `user_id` a moderator of `broadcaster_id`'s channel.
    ///
    /// Returns `false` if the user already was a moderator.
    pub async fn add_moderator(
        &self,
        broadcaster_token: &str,
        broadcaster_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        self.change_moderator(
            reqwest::Method::POST,
            broadcaster_token,
            broadcaster_id,
            user_id,
            "already a mod",
        )
        .await
    }

    /// Remove `user_id` from `broadcaster_id`'s moderators.
    ///
    /// Returns `false` if the user was not a moderator.
    pub async fn remove_moderator(
        &self,
        broadcaster_token: &str,
        broadcaster_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        self.change_moderator(
            reqwest::Method::DELETE,
            broadcaster_token,
            broadcaster_id,
            user_id,
            "not a mod",
        )
        .await
    }

    async fn change_moderator(
        &self,
        method: reqwest::Method,
        broadcaster_token: &str,
        broadcaster_id: &str,
        user_id: &str,
        unchanged_marker: &str,
    ) -> Result<bool, AppError> {
        let response = self
            .helix(method, "/moderation/moderators", broadcaster_token)
            .query(&[("broadcaster_id", broadcaster_id), ("user_id", user_id)])
            .send()
            .await
            .map_err(|e| AppError::TwitchApi(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        let message = error_message(response).await;
        if status == StatusCode::BAD_REQUEST && message.to_lowercase().contains(unchanged_marker) {
            return Ok(false);
        }

        Err(status_error(status, message))
    }

    fn helix(
        &self,
        method: reqwest::Method,
        path: &str,
        access_token: &str,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base_url, path))
            .header("Client-Id", &self.client_id)
            .bearer_auth(access_token)
    }
}

/// Check status and parse a JSON body.
async fn parse_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let message = error_message(response).await;
        return Err(status_error(status, message));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::TwitchApi(format!("JSON parse error: {}", e)))
}

/// Extract Twitch's `message` field, falling back to the raw body.
async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<TwitchErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body)
}

fn status_error(status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            tracing::warn!("Twitch rate limit hit (429)");
            AppError::TwitchApi("Twitch rate limit exceeded".to_string())
        }
        StatusCode::UNAUTHORIZED => AppError::TwitchApi(AppError::TWITCH_TOKEN_ERROR.to_string()),
        _ => AppError::TwitchApi(format!("HTTP {}: {}", status, message)),
    }
}

#[derive(Deserialize)]
struct TwitchErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct HelixData<T> {
    data: Vec<T>,
}

/// Token endpoint response (code exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Vec<String>,
}

/// Helix user.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// TwitchService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreDb;
use crate::middleware::SessionScope;
use crate::models::{ManagedChannel, TwitchUserTokens};
use crate::services::kms::{encrypt_tokens, KmsService};
use crate::time_utils::{expiry_from_now, format_utc_rfc3339, now_rfc3339, parse_utc_rfc3339};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Shared token cache type, keyed by Twitch user ID.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared per-user refresh locks.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// High-level Twitch service that owns the token lifecycle.
#[derive(Clone)]
pub struct TwitchService {
    client: TwitchClient,
    db: FirestoreDb,
    kms: KmsService,
    redirect_uri: String,
    token_cache: TokenCache,
    refresh_locks: RefreshLocks,
}

impl TwitchService {
    pub fn new(config: &Config, db: FirestoreDb, kms: KmsService) -> Self {
        Self {
            client: TwitchClient::new(config),
            db,
            kms,
            redirect_uri: config.twitch_redirect_uri.clone(),
            token_cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &TwitchClient {
        &self.client
    }

    /// Authorization URL for a login with the given session scope.
    pub fn authorize_url(&self, scope: SessionScope, state: &str) -> String {
        let scopes = match scope {
            SessionScope::Streamer => STREAMER_SCOPES,
            SessionScope::Viewer => VIEWER_SCOPES,
        };
        self.client.authorize_url(&self.redirect_uri, scopes, state)
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange the code and identify the user.
    ///
    /// Streamer logins also store encrypted tokens (needed later for
    /// moderator changes) and clear any pending re-auth flag on their channel.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        scope: SessionScope,
    ) -> Result<TwitchUser, AppError> {
        let token = self.client.exchange_code(code, &self.redirect_uri).await?;
        let user = self.client.get_current_user(&token.access_token).await?;

        if scope == SessionScope::Streamer {
            let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
                AppError::TwitchApi("Token response missing refresh token".to_string())
            })?;
            let expires_at = expiry_from_now(token.expires_in);

            self.store_tokens(
                &user.id,
                &user.login,
                &token.access_token,
                refresh_token,
                expires_at,
                token.scope.clone(),
            )
            .await?;
            self.sync_channel_token_state(&user.login, expires_at).await;
        }

        tracing::info!(
            user_login = %user.login,
            scope = scope.as_str(),
            "Twitch OAuth callback handled"
        );

        Ok(user)
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expiring) access token for a broadcaster.
    ///
    /// Cache first; otherwise under a per-user lock load from Firestore,
    /// decrypt, and refresh with Twitch if the token is inside the margin.
    pub async fn get_valid_access_token(&self, twitch_user_id: &str) -> Result<String, AppError> {
        if let Some(token) = self.cached_token(twitch_user_id) {
            return Ok(token);
        }

        let lock = self.refresh_lock(twitch_user_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(token) = self.cached_token(twitch_user_id) {
            return Ok(token);
        }

        let tokens = self.load_tokens(twitch_user_id).await?;
        // Unparseable expiry is treated as already expired.
        let expires_at = parse_utc_rfc3339(&tokens.expires_at).unwrap_or_else(Utc::now);

        if !is_expiring(expires_at) {
            let access_token = self
                .kms
                .decrypt(&tokens.access_token_encrypted, twitch_user_id.as_bytes())
                .await?;
            self.cache_token(twitch_user_id, &access_token, expires_at);
            return Ok(access_token);
        }

        tracing::info!(twitch_user_id, "Twitch access token expiring, refreshing");
        let (access_token, _) = self.refresh_stored(twitch_user_id, &tokens).await?;
        Ok(access_token)
    }

    /// Refresh now regardless of remaining lifetime. Returns the new expiry.
    pub async fn force_refresh(&self, twitch_user_id: &str) -> Result<DateTime<Utc>, AppError> {
        let lock = self.refresh_lock(twitch_user_id);
        let _guard = lock.lock().await;

        let tokens = self.load_tokens(twitch_user_id).await?;
        let (_, expires_at) = self.refresh_stored(twitch_user_id, &tokens).await?;
        Ok(expires_at)
    }

    /// Stored tokens, or a re-auth error if the user never connected.
    pub async fn load_tokens(&self, twitch_user_id: &str) -> Result<TwitchUserTokens, AppError> {
        self.db
            .get_twitch_tokens(twitch_user_id)
            .await?
            .ok_or(AppError::TwitchReauthRequired)
    }

    /// Refresh with the stored refresh token; caller holds the user's lock.
    async fn refresh_stored(
        &self,
        twitch_user_id: &str,
        tokens: &TwitchUserTokens,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let refresh_token = self
            .kms
            .decrypt(&tokens.refresh_token_encrypted, twitch_user_id.as_bytes())
            .await?;

        let fresh = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(e) if e.is_twitch_token_error() => {
                // Another instance may have refreshed first, consuming our
                // refresh token. Its result is in Firestore.
                if let Some(winner) = self.adopt_newer_tokens(twitch_user_id, tokens).await? {
                    tracing::info!(
                        twitch_user_id,
                        "Refresh race lost to another instance, using its tokens"
                    );
                    return Ok(winner);
                }
                tracing::warn!(
                    twitch_user_id,
                    error = %e,
                    "Twitch refused token refresh, re-auth required"
                );
                return Err(self
                    .reject_credentials(twitch_user_id, &tokens.twitch_user_login)
                    .await);
            }
            Err(e) => return Err(e),
        };

        let expires_at = expiry_from_now(fresh.expires_in);
        let scopes = if fresh.scope.is_empty() {
            tokens.scopes.clone()
        } else {
            fresh.scope.clone()
        };

        self.store_tokens(
            twitch_user_id,
            &tokens.twitch_user_login,
            &fresh.access_token,
            fresh.refresh_token.as_deref().unwrap_or(&refresh_token),
            expires_at,
            scopes,
        )
        .await?;
        self.sync_channel_token_state(&tokens.twitch_user_login, expires_at)
            .await;

        tracing::info!(twitch_user_id, "Twitch token refreshed and cached");
        Ok((fresh.access_token, expires_at))
    }

    /// Usable tokens stored since `ours` was read, if any.
    async fn adopt_newer_tokens(
        &self,
        twitch_user_id: &str,
        ours: &TwitchUserTokens,
    ) -> Result<Option<(String, DateTime<Utc>)>, AppError> {
        let Some(latest) = self.db.get_twitch_tokens(twitch_user_id).await? else {
            return Ok(None);
        };
        if latest.refresh_token_encrypted == ours.refresh_token_encrypted
            && latest.expires_at == ours.expires_at
        {
            return Ok(None);
        }
        let Some(expires_at) = parse_utc_rfc3339(&latest.expires_at) else {
            return Ok(None);
        };
        if is_expiring(expires_at) {
            return Ok(None);
        }

        let access_token = self
            .kms
            .decrypt(&latest.access_token_encrypted, twitch_user_id.as_bytes())
            .await?;
        self.cache_token(twitch_user_id, &access_token, expires_at);
        Ok(Some((access_token, expires_at)))
    }

    /// Forget a user's cached token and flag their channel for re-auth.
    ///
    /// Returns the error to surface to the caller.
    pub async fn reject_credentials(&self, twitch_user_id: &str, login: &str) -> AppError {
        self.token_cache.remove(twitch_user_id);
        self.mark_needs_reauth(login).await;
        AppError::TwitchReauthRequired
    }

    /// Encrypt, persist, and cache a token pair.
    async fn store_tokens(
        &self,
        twitch_user_id: &str,
        twitch_user_login: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    ) -> Result<(), AppError> {
        let (access_token_encrypted, refresh_token_encrypted) =
            encrypt_tokens(&self.kms, access_token, refresh_token, twitch_user_id).await?;

        let record = TwitchUserTokens {
            twitch_user_login: twitch_user_login.to_lowercase(),
            access_token_encrypted,
            refresh_token_encrypted,
            expires_at: format_utc_rfc3339(expires_at),
            scopes,
        };
        self.db.set_twitch_tokens(twitch_user_id, &record).await?;
        self.cache_token(twitch_user_id, access_token, expires_at);
        Ok(())
    }

    /// Record fresh credentials on the user's managed channel, if any.
    async fn sync_channel_token_state(&self, login: &str, expires_at: DateTime<Utc>) {
        self.update_channel(login, |channel| {
            channel.needs_twitch_re_auth = false;
            channel.twitch_access_token_expires_at = Some(format_utc_rfc3339(expires_at));
        })
        .await;
    }

    /// Flag the user's managed channel as needing a new Twitch login.
    pub async fn mark_needs_reauth(&self, login: &str) {
        self.update_channel(login, |channel| channel.needs_twitch_re_auth = true)
            .await;
    }

    /// Best-effort read-modify-write of an existing channel document.
    async fn update_channel(&self, login: &str, apply: impl FnOnce(&mut ManagedChannel)) {
        let result = async {
            if let Some(mut channel) = self.db.get_managed_channel(login).await? {
                apply(&mut channel);
                channel.last_updated_at = Some(now_rfc3339());
                self.db.upsert_managed_channel(&channel).await?;
            }
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(login, error = %e, "Failed to update managed channel token state");
        }
    }

    fn cached_token(&self, twitch_user_id: &str) -> Option<String> {
        self.token_cache
            .get(twitch_user_id)
            .filter(|cached| !is_expiring(cached.expires_at))
            .map(|cached| cached.access_token.clone())
    }

    fn cache_token(&self, twitch_user_id: &str, access_token: &str, expires_at: DateTime<Utc>) {
        self.token_cache.insert(
            twitch_user_id.to_string(),
            CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            },
        );
    }

    fn refresh_lock(&self, twitch_user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(twitch_user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn is_expiring(expires_at: DateTime<Utc>) -> bool {
    Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= expires_at
}
