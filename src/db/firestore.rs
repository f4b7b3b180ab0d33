// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Managed channels (bot presence per Twitch channel)
//! - Twitch tokens (encrypted OAuth tokens)
//! - Shortlinks (slug → URL with click counter)
//! - TTS channel configuration and viewer preferences

use crate::db::collections;
use crate::db::memory::MemoryStore;
use crate::error::AppError;
use crate::models::{
    ManagedChannel, Shortlink, TtsChannelConfig, TtsUserPreferences, TwitchUserTokens,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Database handle. Cheap to clone; built once in `main` and passed around.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<MemoryStore>),
}

fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::Database(e.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create an in-memory database (tests and offline runs).
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::new())),
        }
    }

    // ─── Generic Document Operations ──────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collection)
                .obj()
                .one(id)
                .await
                .map_err(db_err),
            Backend::Memory(store) => store
                .get(collection, id)
                .map(serde_json::from_value)
                .transpose()
                .map_err(db_err),
        }
    }

    /// Create or overwrite a document.
    async fn set_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(id)
                    .object(doc)
                    .execute()
                    .await
                    .map_err(db_err)?;
            }
            Backend::Memory(store) => {
                store.set(collection, id, serde_json::to_value(doc).map_err(db_err)?);
            }
        }
        Ok(())
    }

    /// Create a document only if the ID is free. Returns `false` on conflict.
    async fn create_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<bool, AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        match &self.backend {
            Backend::Firestore(client) => {
                let result: Result<(), _> = client
                    .fluent()
                    .insert()
                    .into(collection)
                    .document_id(id)
                    .object(doc)
                    .execute()
                    .await;

                match result {
                    Ok(()) => Ok(true),
                    Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
                    Err(e) => Err(db_err(e)),
                }
            }
            Backend::Memory(store) => {
                Ok(store.create(collection, id, serde_json::to_value(doc).map_err(db_err)?))
            }
        }
    }

    /// Atomically add `by` to an integer field of an existing document.
    ///
    /// Uses a server-side field transform, so concurrent increments never
    /// lose updates.
    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let mut transaction = client.begin_transaction().await.map_err(|e| {
                    AppError::Database(format!("Failed to begin transaction: {}", e))
                })?;

                client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(id)
                    .transforms(|t| t.fields([t.field(field).increment(by)]))
                    .only_transform()
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add increment to transaction: {}", e))
                    })?;

                transaction.commit().await.map_err(|e| {
                    AppError::Database(format!("Transaction commit failed: {}", e))
                })?;
            }
            Backend::Memory(store) => {
                store.increment(collection, id, field, by);
            }
        }
        Ok(())
    }

    // ─── Managed Channel Operations ──────────────────────────────

    /// Get a managed channel by login (case-insensitive).
    pub async fn get_managed_channel(
        &self,
        channel_login: &str,
    ) -> Result<Option<ManagedChannel>, AppError> {
        self.get_doc(collections::MANAGED_CHANNELS, &channel_login.to_lowercase())
            .await
    }

    /// Create or update a managed channel, keyed by its channel name.
    pub async fn upsert_managed_channel(&self, channel: &ManagedChannel) -> Result<(), AppError> {
        self.set_doc(
            collections::MANAGED_CHANNELS,
            &channel.channel_name.to_lowercase(),
            channel,
        )
        .await
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get encrypted Twitch tokens for a user.
    pub async fn get_twitch_tokens(
        &self,
        twitch_user_id: &str,
    ) -> Result<Option<TwitchUserTokens>, AppError> {
        self.get_doc(collections::TWITCH_USER_TOKENS, twitch_user_id)
            .await
    }

    /// Store encrypted Twitch tokens for a user.
    pub async fn set_twitch_tokens(
        &self,
        twitch_user_id: &str,
        tokens: &TwitchUserTokens,
    ) -> Result<(), AppError> {
        self.set_doc(collections::TWITCH_USER_TOKENS, twitch_user_id, tokens)
            .await
    }

    // ─── Shortlink Operations ────────────────────────────────────

    pub async fn get_shortlink(&self, slug: &str) -> Result<Option<Shortlink>, AppError> {
        self.get_doc(collections::SHORTLINKS, slug).await
    }

    /// Store a new shortlink. Returns `false` if the slug is taken.
    pub async fn create_shortlink(&self, slug: &str, link: &Shortlink) -> Result<bool, AppError> {
        self.create_doc(collections::SHORTLINKS, slug, link).await
    }

    /// Look up a shortlink and count one click.
    ///
    /// Returns the record as read before the increment, or `None` if the slug
    /// is unknown (in which case nothing is written).
    pub async fn record_shortlink_click(&self, slug: &str) -> Result<Option<Shortlink>, AppError> {
        let Some(link) = self.get_shortlink(slug).await? else {
            return Ok(None);
        };

        self.increment_field(collections::SHORTLINKS, slug, "clicks", 1)
            .await?;

        Ok(Some(link))
    }

    // ─── TTS Settings Operations ─────────────────────────────────

    pub async fn get_tts_channel_config(
        &self,
        channel_login: &str,
    ) -> Result<Option<TtsChannelConfig>, AppError> {
        self.get_doc(collections::TTS_CHANNEL_CONFIGS, &channel_login.to_lowercase())
            .await
    }

    pub async fn set_tts_channel_config(
        &self,
        channel_login: &str,
        config: &TtsChannelConfig,
    ) -> Result<(), AppError> {
        self.set_doc(
            collections::TTS_CHANNEL_CONFIGS,
            &channel_login.to_lowercase(),
            config,
        )
        .await
    }

    pub async fn get_tts_user_preferences(
        &self,
        user_login: &str,
    ) -> Result<Option<TtsUserPreferences>, AppError> {
        self.get_doc(collections::TTS_USER_PREFERENCES, &user_login.to_lowercase())
            .await
    }

    pub async fn set_tts_user_preferences(
        &self,
        user_login: &str,
        prefs: &TtsUserPreferences,
    ) -> Result<(), AppError> {
        self.set_doc(
            collections::TTS_USER_PREFERENCES,
            &user_login.to_lowercase(),
            prefs,
        )
        .await
    }
}
