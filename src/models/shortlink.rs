// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shortlink model.

use serde::{Deserialize, Serialize};

/// Stored shortlink record, keyed by slug in `shortlinks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortlink {
    /// Redirect target; never changes after creation
    pub url: String,
    /// Redirect count, only ever changed by atomic increment
    #[serde(default)]
    pub clicks: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Login of the user who created the link
    #[serde(default)]
    pub created_by: Option<String>,
}

impl Shortlink {
    pub fn new(url: String, created_by: Option<String>) -> Self {
        Self {
            url,
            clicks: 0,
            created_at: Some(crate::time_utils::now_rfc3339()),
            created_by,
        }
    }
}
