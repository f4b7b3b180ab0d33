// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bot activation: whether the chat bot is present in a streamer's channel.
//!
//! A channel moves `inactive → active` only after Twitch accepts the bot as a
//! moderator, and `active → inactive` regardless of whether Twitch accepts
//! the moderator removal.

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::middleware::SessionUser;
use crate::models::ManagedChannel;
use crate::services::twitch::{TwitchService, MODERATOR_SCOPE};
use crate::time_utils::now_rfc3339;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Outcome of an add/remove request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotToggle {
    Activated,
    AlreadyActive,
    Deactivated,
    AlreadyInactive,
}

impl BotToggle {
    pub fn message(&self) -> &'static str {
        match self {
            BotToggle::Activated => "Bot added to your channel",
            BotToggle::AlreadyActive => "Bot is already active in your channel",
            BotToggle::Deactivated => "Bot removed from your channel",
            BotToggle::AlreadyInactive => "Bot is not active in your channel",
        }
    }
}

/// Bot presence as reported to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub is_active: bool,
    pub channel_name: String,
    pub needs_twitch_re_auth: bool,
}

#[derive(Clone)]
pub struct BotService {
    db: FirestoreDb,
    twitch: TwitchService,
    bot_username: String,
    /// Bot user ID from config, or resolved from Helix on first use
    bot_user_id: Arc<OnceCell<String>>,
}

impl BotService {
    pub fn new(config: &Config, db: FirestoreDb, twitch: TwitchService) -> Self {
        let bot_user_id = match &config.twitch_bot_user_id {
            Some(id) => OnceCell::new_with(Some(id.clone())),
            None => OnceCell::new(),
        };

        Self {
            db,
            twitch,
            bot_username: config.twitch_bot_username.clone(),
            bot_user_id: Arc::new(bot_user_id),
        }
    }

    pub async fn status(&self, user: &SessionUser) -> Result<BotStatus, AppError> {
        let channel_login = user.channel_login();
        let channel = self.db.get_managed_channel(&channel_login).await?;

        Ok(match channel {
            Some(channel) => BotStatus {
                is_active: channel.is_active,
                channel_name: channel.channel_name,
                needs_twitch_re_auth: channel.needs_twitch_re_auth,
            },
            None => BotStatus {
                is_active: false,
                channel_name: channel_login,
                needs_twitch_re_auth: false,
            },
        })
    }

    /// Add the bot to the caller's channel.
    pub async fn activate(&self, user: &SessionUser) -> Result<BotToggle, AppError> {
        user.require_streamer()?;
        let channel_login = user.channel_login();

        let existing = self.db.get_managed_channel(&channel_login).await?;
        if existing.as_ref().is_some_and(|c| c.is_active) {
            tracing::debug!(channel = %channel_login, "Bot already active");
            return Ok(BotToggle::AlreadyActive);
        }

        let tokens = self.twitch.load_tokens(&user.user_id).await?;
        if !tokens.has_scope(MODERATOR_SCOPE) {
            tracing::warn!(
                channel = %channel_login,
                "Stored Twitch grant lacks moderator scope"
            );
            self.twitch.mark_needs_reauth(&channel_login).await;
            return Err(AppError::TwitchReauthRequired);
        }

        let added = match self.add_bot_moderator(&user.user_id).await {
            Ok(added) => added,
            Err(e) if e.is_twitch_token_error() => {
                tracing::warn!(
                    channel = %channel_login,
                    error = %e,
                    "Twitch rejected broadcaster token"
                );
                return Err(self
                    .twitch
                    .reject_credentials(&user.user_id, &channel_login)
                    .await);
            }
            Err(e) => return Err(e),
        };
        tracing::info!(channel = %channel_login, newly_added = added, "Bot moderator status granted");

        // Re-read: obtaining the access token may have refreshed it.
        let expires_at = self
            .db
            .get_twitch_tokens(&user.user_id)
            .await?
            .map_or(tokens.expires_at, |fresh| fresh.expires_at);

        let now = now_rfc3339();
        let mut channel =
            existing.unwrap_or_else(|| ManagedChannel::new(&user.user_id, &channel_login));
        channel.twitch_user_id = user.user_id.clone();
        channel.is_active = true;
        channel.needs_twitch_re_auth = false;
        channel.twitch_access_token_expires_at = Some(expires_at);
        channel.added_at.get_or_insert_with(|| now.clone());
        channel.last_updated_at = Some(now);

        self.db.upsert_managed_channel(&channel).await?;
        tracing::info!(channel = %channel_login, "Bot activated");

        Ok(BotToggle::Activated)
    }

    /// Remove the bot from the caller's channel.
    ///
    /// The Twitch moderator removal is best-effort; the channel is marked
    /// inactive either way.
    pub async fn deactivate(&self, user: &SessionUser) -> Result<BotToggle, AppError> {
        user.require_streamer()?;
        let channel_login = user.channel_login();

        let mut channel = match self.db.get_managed_channel(&channel_login).await? {
            Some(channel) if channel.is_active => channel,
            _ => {
                tracing::debug!(channel = %channel_login, "Bot already inactive");
                return Ok(BotToggle::AlreadyInactive);
            }
        };

        if let Err(e) = self.remove_bot_moderator(&channel.twitch_user_id).await {
            tracing::warn!(
                channel = %channel_login,
                error = %e,
                "Failed to remove bot moderator status, deactivating anyway"
            );
        }

        channel.is_active = false;
        channel.last_updated_at = Some(now_rfc3339());
        self.db.upsert_managed_channel(&channel).await?;
        tracing::info!(channel = %channel_login, "Bot deactivated");

        Ok(BotToggle::Deactivated)
    }

    async fn add_bot_moderator(&self, broadcaster_id: &str) -> Result<bool, AppError> {
        let access_token = self.twitch.get_valid_access_token(broadcaster_id).await?;
        let bot_user_id = self.bot_user_id(&access_token).await?;
        self.twitch
            .client()
            .add_moderator(&access_token, broadcaster_id, &bot_user_id)
            .await
    }

    async fn remove_bot_moderator(&self, broadcaster_id: &str) -> Result<(), AppError> {
        let access_token = self.twitch.get_valid_access_token(broadcaster_id).await?;
        let bot_user_id = self.bot_user_id(&access_token).await?;
        self.twitch
            .client()
            .remove_moderator(&access_token, broadcaster_id, &bot_user_id)
            .await?;
        Ok(())
    }

    async fn bot_user_id(&self, access_token: &str) -> Result<String, AppError> {
        self.bot_user_id
            .get_or_try_init(|| async {
                let bot = self
                    .twitch
                    .client()
                    .get_user_by_login(access_token, &self.bot_username)
                    .await?
                    .ok_or_else(|| {
                        AppError::TwitchApi(format!(
                            "Bot account '{}' not found on Twitch",
                            self.bot_username
                        ))
                    })?;
                tracing::info!(bot_user_id = %bot.id, "Resolved bot user ID");
                Ok::<_, AppError>(bot.id)
            })
            .await
            .cloned()
    }
}
