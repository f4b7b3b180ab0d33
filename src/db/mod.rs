//! Database layer (Firestore).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    pub const MANAGED_CHANNELS: &str = "managedChannels";
    pub const SHORTLINKS: &str = "shortlinks";
    pub const TTS_CHANNEL_CONFIGS: &str = "ttsChannelConfigs";
    pub const TTS_USER_PREFERENCES: &str = "ttsUserPreferences";
    /// Encrypted Twitch OAuth tokens (keyed by Twitch user ID)
    pub const TWITCH_USER_TOKENS: &str = "twitchUserTokens";
}
