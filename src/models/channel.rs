// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Managed channel model for storage and API.

use serde::{Deserialize, Serialize};

/// A Twitch channel whose bot presence is tracked.
///
/// Stored in `managedChannels`, keyed by the lowercase channel login.
/// Documents are never deleted; deactivation clears `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedChannel {
    /// Broadcaster's Twitch user ID
    pub twitch_user_id: String,
    /// Broadcaster's Twitch login
    pub twitch_user_login: String,
    /// Channel name the bot joins (lowercase login)
    pub channel_name: String,
    /// Whether the bot should be present in this channel's chat
    pub is_active: bool,
    /// Set when stored Twitch credentials can no longer be refreshed
    #[serde(default)]
    pub needs_twitch_re_auth: bool,
    /// Broadcaster access token expiry (RFC 3339)
    #[serde(default)]
    pub twitch_access_token_expires_at: Option<String>,
    /// When the bot was first added
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub last_updated_at: Option<String>,
}

impl ManagedChannel {
    /// A new, inactive channel record for a broadcaster.
    pub fn new(twitch_user_id: &str, twitch_user_login: &str) -> Self {
        let login = twitch_user_login.to_lowercase();
        Self {
            twitch_user_id: twitch_user_id.to_string(),
            twitch_user_login: login.clone(),
            channel_name: login,
            is_active: false,
            needs_twitch_re_auth: false,
            twitch_access_token_expires_at: None,
            added_at: None,
            last_updated_at: None,
        }
    }
}
