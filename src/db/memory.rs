// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store used by tests that run without Firestore.
//!
//! Documents are kept as JSON values so they go through the same serde
//! mapping as Firestore documents.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

type DocKey = (String, String);

/// Concurrent map of `(collection, document id)` to JSON document.
#[derive(Default)]
pub struct MemoryStore {
    docs: DashMap<DocKey, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|doc| doc.value().clone())
    }

    pub fn set(&self, collection: &str, id: &str, doc: Value) {
        self.docs.insert((collection.to_string(), id.to_string()), doc);
    }

    /// Insert only if no document exists. Returns `false` on conflict.
    pub fn create(&self, collection: &str, id: &str, doc: Value) -> bool {
        match self.docs.entry((collection.to_string(), id.to_string())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(doc);
                true
            }
        }
    }

    /// Add `by` to an integer field while holding the entry lock.
    ///
    /// Returns `false` if the document does not exist.
    pub fn increment(&self, collection: &str, id: &str, field: &str, by: i64) -> bool {
        let Some(mut doc) = self.docs.get_mut(&(collection.to_string(), id.to_string())) else {
            return false;
        };
        if let Some(fields) = doc.value_mut().as_object_mut() {
            let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
            fields.insert(field.to_string(), Value::from(current + by));
        }
        true
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
