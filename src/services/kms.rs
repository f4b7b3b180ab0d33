// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Twitch token encryption with Cloud KMS.
//!
//! Ciphertexts are bound to the owning Twitch user ID as additional
//! authenticated data; a token document copied onto another user will not
//! decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use google_cloud_googleapis::cloud::kms::v1::{DecryptRequest, EncryptRequest};
use google_cloud_kms::client::{Client, ClientConfig};
use std::sync::Arc;

/// Key used for Twitch tokens.
pub const TOKEN_KEY_NAME: &str = "twitch-token-encryption";

const KEY_RING_NAME: &str = "chatvibes";

#[derive(Clone)]
enum Backend {
    Cloud {
        client: Arc<Client>,
        /// projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
        key_path: String,
    },
    /// Offline stand-in: base64 of `hex(aad):plaintext`
    #[cfg(debug_assertions)]
    Mock,
}

#[derive(Clone)]
pub struct KmsService {
    backend: Backend,
}

fn kms_err(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!("{}: {}", context, e))
}

impl KmsService {
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id, location, KEY_RING_NAME, key_name
        );

        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| kms_err("KMS auth config", e))?;
        let client = Client::new(config)
            .await
            .map_err(|e| kms_err("KMS client", e))?;

        tracing::info!(key = %key_path, "KMS service initialized");

        Ok(Self {
            backend: Backend::Cloud {
                client: Arc::new(client),
                key_path,
            },
        })
    }

    /// Offline KMS for tests. Debug builds only.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Mock,
        }
    }

    /// Encrypt `plaintext` bound to `aad`; returns base64 ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, AppError> {
        match &self.backend {
            Backend::Cloud { client, key_path } => {
                let req = EncryptRequest {
                    name: key_path.clone(),
                    plaintext: plaintext.as_bytes().to_vec(),
                    additional_authenticated_data: aad.to_vec(),
                    ..Default::default()
                };
                let response = client
                    .encrypt(req, None)
                    .await
                    .map_err(|e| kms_err("KMS encrypt failed", e))?;
                Ok(BASE64.encode(response.ciphertext))
            }
            #[cfg(debug_assertions)]
            Backend::Mock => Ok(BASE64.encode(format!("{}:{}", hex::encode(aad), plaintext))),
        }
    }

    /// Decrypt base64 ciphertext that was bound to `aad`.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, AppError> {
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| kms_err("Base64 ciphertext decode failed", e))?;

        let plaintext = match &self.backend {
            Backend::Cloud { client, key_path } => {
                let req = DecryptRequest {
                    name: key_path.clone(),
                    ciphertext,
                    additional_authenticated_data: aad.to_vec(),
                    ..Default::default()
                };
                client
                    .decrypt(req, None)
                    .await
                    .map_err(|e| kms_err("KMS decrypt failed", e))?
                    .plaintext
            }
            #[cfg(debug_assertions)]
            Backend::Mock => {
                let expected = format!("{}:", hex::encode(aad));
                match ciphertext.strip_prefix(expected.as_bytes()) {
                    Some(rest) => rest.to_vec(),
                    None => return Err(kms_err("KMS decrypt failed", "AAD mismatch")),
                }
            }
        };

        String::from_utf8(plaintext).map_err(|e| kms_err("UTF-8 decode failed", e))
    }
}

/// Encrypt an access/refresh token pair for `twitch_user_id`.
pub async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: &str,
    twitch_user_id: &str,
) -> Result<(String, String), AppError> {
    let aad = twitch_user_id.as_bytes();
    let encrypted_access = kms.encrypt(access_token, aad).await?;
    let encrypted_refresh = kms.encrypt(refresh_token, aad).await?;
    Ok((encrypted_access, encrypted_refresh))
}
