//! Live store index
//!
//! Nested HashMap; not internally locked. The engine's RwLock guards it
//! together with the log handle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::Entry;
use crate::error::{EmberError, Result};

/// bucket → key → Entry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreIndex {
    buckets: HashMap<String, HashMap<String, Entry>>,
}

impl StoreIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry, expired or not
    pub fn get(&self, bucket: &str, key: &str) -> Result<&Entry> {
        let keys = self
            .buckets
            .get(bucket)
            .ok_or_else(|| EmberError::bucket_not_found(bucket))?;
        keys.get(key)
            .ok_or_else(|| EmberError::key_not_found(bucket, key))
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    /// Insert or replace an entry, creating the bucket if absent
    pub fn insert(&mut self, bucket: &str, key: &str, entry: Entry) -> Option<Entry> {
        self.bucket_mut(bucket).insert(key.to_string(), entry)
    }

    /// Remove a key. The bucket stays even if it becomes empty.
    pub fn remove(&mut self, bucket: &str, key: &str) -> Option<Entry> {
        self.buckets.get_mut(bucket)?.remove(key)
    }

    /// Get a bucket's key map, creating an empty one if needed
    pub fn bucket_mut(&mut self, bucket: &str) -> &mut HashMap<String, Entry> {
        self.buckets.entry(bucket.to_string()).or_default()
    }

    /// Iterate over every (bucket, key, entry), expired ones included
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Entry)> {
        self.buckets.iter().flat_map(|(bucket, keys)| {
            keys.iter()
                .map(move |(key, entry)| (bucket.as_str(), key.as_str(), entry))
        })
    }

    /// Drop every entry expired at `now`. Buckets are kept.
    ///
    /// Returns the number of entries evicted.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        for keys in self.buckets.values_mut() {
            let before = keys.len();
            keys.retain(|_, entry| !entry.is_expired_at(now));
            evicted += before - keys.len();
        }
        evicted
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of resident entries, expired ones included
    pub fn key_count(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
