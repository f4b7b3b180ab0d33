// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod bot;
pub mod kms;
pub mod shortlink;
pub mod tts;
pub mod twitch;

pub use bot::{BotService, BotStatus, BotToggle};
pub use kms::KmsService;
pub use shortlink::{CreatedShortlink, ShortlinkService};
pub use tts::TtsClient;
pub use twitch::{TwitchClient, TwitchService, TwitchUser};
