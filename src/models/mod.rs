// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod channel;
pub mod shortlink;
pub mod tts;
pub mod user;

pub use channel::ManagedChannel;
pub use shortlink::Shortlink;
pub use tts::{TtsChannelConfig, TtsUserPreferences, VoiceSettings};
pub use user::TwitchUserTokens;
