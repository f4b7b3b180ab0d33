// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shortlink creation and resolution.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::Shortlink;
use ring::rand::{SecureRandom, SystemRandom};

pub const SLUG_LENGTH: usize = 8;
/// Attempts at finding a free slug before giving up.
pub const MAX_SLUG_ATTEMPTS: usize = 5;

const SLUG_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
/// Largest multiple of 62 that fits in a byte; bytes at or above it are
/// discarded so every symbol is equally likely.
const UNBIASED_LIMIT: u8 = 248;

/// A newly stored shortlink.
#[derive(Debug, Clone)]
pub struct CreatedShortlink {
    pub slug: String,
    /// Path relative to the API host
    pub short_url: String,
    pub absolute_url: String,
}

#[derive(Clone)]
pub struct ShortlinkService {
    db: FirestoreDb,
    rng: SystemRandom,
    public_base_url: String,
}

impl ShortlinkService {
    pub fn new(db: FirestoreDb, public_base_url: &str) -> Self {
        Self {
            db,
            rng: SystemRandom::new(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Store `url` under a fresh random slug.
    pub async fn create(
        &self,
        url: &str,
        created_by: Option<String>,
    ) -> Result<CreatedShortlink, AppError> {
        self.create_with(url, created_by, || generate_slug(&self.rng))
            .await
    }

    /// Store `url` under the first slug from `next_slug` that is not taken.
    pub async fn create_with<F>(
        &self,
        url: &str,
        created_by: Option<String>,
        mut next_slug: F,
    ) -> Result<CreatedShortlink, AppError>
    where
        F: FnMut() -> Result<String, AppError>,
    {
        let link = Shortlink::new(url.to_string(), created_by);

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = next_slug()?;
            if self.db.create_shortlink(&slug, &link).await? {
                tracing::info!(slug = %slug, attempt, "Shortlink created");
                return Ok(CreatedShortlink {
                    short_url: format!("/s/{}", slug),
                    absolute_url: format!("{}/s/{}", self.public_base_url, slug),
                    slug,
                });
            }
            tracing::warn!(slug = %slug, attempt, "Slug collision, regenerating");
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "No free slug after {} attempts",
            MAX_SLUG_ATTEMPTS
        )))
    }

    /// Resolve a slug to its target URL, counting the click.
    pub async fn follow(&self, slug: &str) -> Result<Option<String>, AppError> {
        if !is_valid_slug(slug) {
            return Ok(None);
        }
        Ok(self
            .db
            .record_shortlink_click(slug)
            .await?
            .map(|link| link.url))
    }
}

/// Random base62 slug from the OS CSPRNG.
pub fn generate_slug(rng: &dyn SecureRandom) -> Result<String, AppError> {
    let mut slug = String::with_capacity(SLUG_LENGTH);
    let mut buf = [0u8; SLUG_LENGTH * 2];

    while slug.len() < SLUG_LENGTH {
        rng.fill(&mut buf)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;

        for &b in buf.iter().filter(|&&b| b < UNBIASED_LIMIT) {
            if slug.len() == SLUG_LENGTH {
                break;
            }
            slug.push(SLUG_ALPHABET[(b % 62) as usize] as char);
        }
    }

    Ok(slug)
}

/// Slugs we could have generated; anything else is a guaranteed miss.
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= 64 && slug.bytes().all(|b| b.is_ascii_alphanumeric())
}
