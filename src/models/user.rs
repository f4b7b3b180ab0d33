//! Twitch credential model for storage.

use serde::{Deserialize, Serialize};

/// A user's Twitch OAuth tokens (encrypted in Firestore).
///
/// Keyed by Twitch user ID in `twitchUserTokens`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitchUserTokens {
    /// Twitch login, used to find the matching managed channel
    pub twitch_user_login: String,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}

impl TwitchUserTokens {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
