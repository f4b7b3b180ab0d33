// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TTS settings: per-channel configuration and per-viewer voice preferences.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

pub const DEFAULT_VOICE_ID: &str = "Friendly_Person";
pub const DEFAULT_EMOTION: &str = "auto";
pub const DEFAULT_LANGUAGE_BOOST: &str = "Automatic";

/// Channel TTS configuration, keyed by lowercase channel login in `ttsChannelConfigs`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsChannelConfig {
    /// Whether chat messages are spoken at all
    pub engine_enabled: bool,
    /// `all` speaks every message, `command` only `!tts` messages
    #[validate(custom(function = "validate_mode"))]
    pub mode: String,
    #[validate(length(min = 1, max = 64))]
    pub voice_id: String,
    #[validate(length(min = 1, max = 32))]
    pub emotion: String,
    #[validate(range(min = -12, max = 12))]
    pub pitch: i32,
    #[validate(range(min = 0.5, max = 2.0))]
    pub speed: f64,
    #[validate(length(min = 1, max = 32))]
    pub language_boost: String,
    /// Whether viewer voice preferences override the channel voice
    pub allow_viewer_preferences: bool,
    pub updated_at: Option<String>,
}

impl Default for TtsChannelConfig {
    fn default() -> Self {
        Self {
            engine_enabled: false,
            mode: "command".to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            emotion: DEFAULT_EMOTION.to_string(),
            pitch: 0,
            speed: 1.0,
            language_boost: DEFAULT_LANGUAGE_BOOST.to_string(),
            allow_viewer_preferences: true,
            updated_at: None,
        }
    }
}

fn validate_mode(mode: &str) -> Result<(), ValidationError> {
    match mode {
        "all" | "command" => Ok(()),
        _ => Err(ValidationError::new("mode")),
    }
}

/// A viewer's personal voice settings, keyed by lowercase login in `ttsUserPreferences`.
///
/// Unset fields fall back to the channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsUserPreferences {
    #[validate(length(min = 1, max = 64))]
    pub voice_id: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub emotion: Option<String>,
    #[validate(range(min = -12, max = 12))]
    pub pitch: Option<i32>,
    #[validate(range(min = 0.5, max = 2.0))]
    pub speed: Option<f64>,
    #[validate(length(min = 1, max = 32))]
    pub language_boost: Option<String>,
    pub updated_at: Option<String>,
}

/// Fully resolved voice parameters for one synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub voice_id: String,
    pub emotion: String,
    pub pitch: i32,
    pub speed: f64,
    pub language_boost: String,
}

impl From<&TtsChannelConfig> for VoiceSettings {
    fn from(config: &TtsChannelConfig) -> Self {
        Self {
            voice_id: config.voice_id.clone(),
            emotion: config.emotion.clone(),
            pitch: config.pitch,
            speed: config.speed,
            language_boost: config.language_boost.clone(),
        }
    }
}

impl VoiceSettings {
    /// Overlay any fields set in `prefs`.
    pub fn apply(mut self, prefs: &TtsUserPreferences) -> Self {
        if let Some(voice_id) = &prefs.voice_id {
            self.voice_id = voice_id.clone();
        }
        if let Some(emotion) = &prefs.emotion {
            self.emotion = emotion.clone();
        }
        if let Some(pitch) = prefs.pitch {
            self.pitch = pitch;
        }
        if let Some(speed) = prefs.speed {
            self.speed = speed;
        }
        if let Some(language_boost) = &prefs.language_boost {
            self.language_boost = language_boost.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TtsChannelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unknown_mode_and_bad_speed() {
        let config = TtsChannelConfig {
            mode: "everything".to_string(),
            speed: 3.0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("mode"));
        assert!(fields.contains_key("speed"));
    }

    #[test]
    fn test_preferences_overlay_only_set_fields() {
        let base = VoiceSettings::from(&TtsChannelConfig::default());
        let prefs = TtsUserPreferences {
            voice_id: Some("Wise_Woman".to_string()),
            pitch: Some(-3),
            ..Default::default()
        };

        let merged = base.clone().apply(&prefs);
        assert_eq!(merged.voice_id, "Wise_Woman");
        assert_eq!(merged.pitch, -3);
        assert_eq!(merged.speed, base.speed);
        assert_eq!(merged.emotion, base.emotion);
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let config: TtsChannelConfig =
            serde_json::from_str(r#"{"engineEnabled": true, "pitch": 2}"#).unwrap();
        assert!(config.engine_enabled);
        assert_eq!(config.pitch, 2);
        assert_eq!(config.voice_id, DEFAULT_VOICE_ID);
    }
}
