// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ChatVibes: backend API for a Twitch chat bot with text-to-speech.
//!
//! Streamers log in with Twitch, add or remove the bot from their channel,
//! and tune the channel's TTS voice. Viewers log in to set personal voice
//! preferences. The API also hosts a small shortlink redirector.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{BotService, KmsService, ShortlinkService, TtsClient, TwitchService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub twitch: TwitchService,
    pub bot: BotService,
    pub shortlinks: ShortlinkService,
    pub tts: TtsClient,
}

impl AppState {
    /// Wire up services around a database handle and KMS client.
    pub fn new(config: Config, db: FirestoreDb, kms: KmsService) -> Self {
        let twitch = TwitchService::new(&config, db.clone(), kms);
        let bot = BotService::new(&config, db.clone(), twitch.clone());
        let shortlinks = ShortlinkService::new(db.clone(), &config.public_base_url);
        let tts = TtsClient::new(&config);

        Self {
            config,
            db,
            twitch,
            bot,
            shortlinks,
            tts,
        }
    }
}
