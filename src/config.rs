// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup and kept in memory.

use std::env;

/// Default Replicate-hosted speech model used by the TTS proxy.
pub const DEFAULT_TTS_MODEL: &str = "minimax/speech-02-turbo";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Twitch application client ID (public)
    pub twitch_client_id: String,
    /// OAuth redirect URI registered with Twitch
    pub twitch_redirect_uri: String,
    /// Frontend (dashboard) URL for redirects and CORS
    pub frontend_url: String,
    /// Public base URL of this API, used to build absolute short URLs
    pub public_base_url: String,
    /// Twitch login of the chat bot account
    pub twitch_bot_username: String,
    /// Twitch user ID of the bot account (looked up by login when unset)
    pub twitch_bot_user_id: Option<String>,
    /// Replicate model identifier (`owner/name`)
    pub tts_model: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (KMS key location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,

    // --- Upstream endpoints (overridable for local stacks) ---
    pub twitch_api_base_url: String,
    pub twitch_auth_base_url: String,
    pub tts_api_base_url: String,

    // --- Secrets ---
    /// Twitch application client secret
    pub twitch_client_secret: String,
    /// HS256 key for session tokens (raw bytes)
    pub jwt_secret: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// TTS provider API token; `None` disables the TTS proxy
    pub tts_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_secret = required("JWT_SECRET_KEY")?.into_bytes();
        let oauth_state_key = optional("OAUTH_STATE_KEY")
            .map(String::into_bytes)
            .unwrap_or_else(|| jwt_secret.clone());

        let public_base_url = optional("API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string());

        Ok(Self {
            twitch_client_id: required("TWITCH_CLIENT_ID")?,
            twitch_redirect_uri: optional("CALLBACK_URL")
                .unwrap_or_else(|| format!("{}/auth/twitch/callback", public_base_url)),
            frontend_url: optional("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            twitch_bot_username: optional("TWITCH_BOT_USERNAME")
                .unwrap_or_else(|| "chatvibesbot".to_string())
                .to_lowercase(),
            twitch_bot_user_id: optional("TWITCH_BOT_USER_ID"),
            tts_model: optional("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            gcp_project_id: optional("GCP_PROJECT_ID").unwrap_or_else(|| "local-dev".to_string()),
            gcp_region: optional("GCP_REGION").unwrap_or_else(|| "us-central1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            twitch_api_base_url: optional("TWITCH_API_BASE_URL")
                .unwrap_or_else(|| "https://api.twitch.tv/helix".to_string()),
            twitch_auth_base_url: optional("TWITCH_AUTH_BASE_URL")
                .unwrap_or_else(|| "https://id.twitch.tv/oauth2".to_string()),
            tts_api_base_url: optional("TTS_API_BASE_URL")
                .unwrap_or_else(|| "https://api.replicate.com/v1".to_string()),

            twitch_client_secret: required("TWITCH_CLIENT_SECRET")?,
            jwt_secret,
            oauth_state_key,
            tts_api_key: optional("REPLICATE_API_TOKEN"),
        })
    }

    /// Config for tests: no TTS key, upstreams pointed at a closed local port.
    pub fn test_default() -> Self {
        Self {
            twitch_client_id: "test_client_id".to_string(),
            twitch_redirect_uri: "http://localhost:8080/auth/twitch/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            twitch_bot_username: "chatvibesbot".to_string(),
            twitch_bot_user_id: Some("900000001".to_string()),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            port: 8080,
            twitch_api_base_url: "http://127.0.0.1:9/helix".to_string(),
            twitch_auth_base_url: "http://127.0.0.1:9/oauth2".to_string(),
            tts_api_base_url: "http://127.0.0.1:9/v1".to_string(),
            twitch_client_secret: "test_secret".to_string(),
            jwt_secret: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            tts_api_key: None,
        }
    }

    /// Whether the TTS proxy has credentials.
    pub fn tts_configured(&self) -> bool {
        self.tts_api_key.is_some()
    }
}

/// Read a required variable, trimming stray whitespace from secret bindings.
fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Read an optional variable; empty values count as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
