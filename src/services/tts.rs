// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TTS provider client (Replicate predictions API).

use crate::config::Config;
use crate::error::AppError;
use crate::models::VoiceSettings;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const NOT_CONFIGURED: &str = "TTS provider not configured";

/// Seconds the provider may hold the create request open.
const SYNC_WAIT_SECS: u64 = 25;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// The create request alone outlives the synchronous wait.
const CREATE_TIMEOUT: Duration = Duration::from_secs(SYNC_WAIT_SECS + 5);
const MAX_POLLS: usize = 10;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct TtsClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl TtsClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: config.tts_api_base_url.trim_end_matches('/').to_string(),
            model: config.tts_model.clone(),
            api_key: config.tts_api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Synthesize `text` and return the URL of the generated audio.
    pub async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured(NOT_CONFIGURED.to_string()))?;

        let body = json!({
            "input": {
                "text": text,
                "voice_id": voice.voice_id,
                "emotion": voice.emotion,
                "pitch": voice.pitch,
                "speed": voice.speed,
                "language_boost": voice.language_boost,
                "english_normalization": true,
            }
        });

        let response = self
            .http
            .post(format!("{}/models/{}/predictions", self.base_url, self.model))
            .bearer_auth(api_key)
            .header("Prefer", format!("wait={}", SYNC_WAIT_SECS))
            .timeout(CREATE_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::TtsProvider(format!("Prediction request failed: {}", e)))?;

        let mut prediction: Prediction = parse_json(response).await?;
        tracing::debug!(prediction_id = %prediction.id, status = %prediction.status, "TTS prediction created");

        for _ in 0..MAX_POLLS {
            if let Some(result) = prediction.outcome() {
                return result;
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .http
                .get(format!("{}/predictions/{}", self.base_url, prediction.id))
                .bearer_auth(api_key)
                .send()
                .await
                .map_err(|e| AppError::TtsProvider(format!("Prediction poll failed: {}", e)))?;
            prediction = parse_json(response).await?;
        }

        prediction.outcome().unwrap_or_else(|| {
            tracing::warn!(prediction_id = %prediction.id, "TTS prediction did not finish in time");
            Err(AppError::TtsProvider(
                "Speech generation timed out".to_string(),
            ))
        })
    }
}

async fn parse_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, body = %body, "TTS provider returned an error");
        return Err(AppError::TtsProvider(format!("HTTP {}", status)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::TtsProvider(format!("JSON parse error: {}", e)))
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl Prediction {
    /// `None` while the prediction is still running.
    fn outcome(&self) -> Option<Result<String, AppError>> {
        match self.status.as_str() {
            "succeeded" => Some(self.audio_url().ok_or_else(|| {
                AppError::TtsProvider("Prediction succeeded without audio output".to_string())
            })),
            "failed" | "canceled" => Some(Err(AppError::TtsProvider(
                self.error
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or("Speech generation failed")
                    .to_string(),
            ))),
            _ => None,
        }
    }

    /// Output is either a URL string or a list whose first entry is one.
    fn audio_url(&self) -> Option<String> {
        match self.output.as_ref()? {
            Value::String(url) => Some(url.clone()),
            Value::Array(items) => items.first()?.as_str().map(str::to_string),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(raw: Value) -> Prediction {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_succeeded_with_string_output() {
        let p = prediction(json!({"id": "p1", "status": "succeeded", "output": "https://cdn/a.mp3"}));
        assert_eq!(p.outcome().unwrap().unwrap(), "https://cdn/a.mp3");
    }

    #[test]
    fn test_succeeded_with_list_output() {
        let p = prediction(json!({"id": "p1", "status": "succeeded", "output": ["https://cdn/b.mp3"]}));
        assert_eq!(p.outcome().unwrap().unwrap(), "https://cdn/b.mp3");
    }

    #[test]
    fn test_running_has_no_outcome() {
        let p = prediction(json!({"id": "p1", "status": "processing", "output": null}));
        assert!(p.outcome().is_none());
    }

    #[test]
    fn test_failed_carries_provider_message() {
        let p = prediction(json!({"id": "p1", "status": "failed", "error": "voice not found"}));
        match p.outcome().unwrap() {
            Err(AppError::TtsProvider(msg)) => assert_eq!(msg, "voice not found"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = TtsClient::new(&Config::test_default());
        assert!(!client.is_configured());

        let voice = VoiceSettings::from(&crate::models::TtsChannelConfig::default());
        let err = client.synthesize("Hello world", &voice).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(ref msg) if msg == NOT_CONFIGURED));
    }
}
