//! Transaction staging buffer
//!
//! Holds the writes of one transaction (or one replayed TX_BEGIN..TX_COMMIT
//! bracket) until commit. Never visible to other readers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{Entry, StoreIndex};

/// A staged write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedWrite {
    /// Set the key to this entry
    Value(Entry),

    /// Delete the key
    Tombstone,
}

/// bucket → key → StagedWrite
#[derive(Debug, Default, Clone)]
pub struct StagingBuffer {
    buckets: HashMap<String, HashMap<String, StagedWrite>>,
}

/// Counts from merging a staging buffer into the live index
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: u64,
    pub expired: u64,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, bucket: &str, key: &str, entry: Entry) {
        self.bucket_mut(bucket)
            .insert(key.to_string(), StagedWrite::Value(entry));
    }

    pub fn delete(&mut self, bucket: &str, key: &str) {
        self.bucket_mut(bucket)
            .insert(key.to_string(), StagedWrite::Tombstone);
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<&StagedWrite> {
        self.buckets.get(bucket)?.get(key)
    }

    /// Iterate over every staged (bucket, key, write)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &StagedWrite)> {
        self.buckets.iter().flat_map(|(bucket, keys)| {
            keys.iter()
                .map(move |(key, write)| (bucket.as_str(), key.as_str(), write))
        })
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Forget staged values expired at `now`. Tombstones are kept.
    pub fn retain_live(&mut self, now: DateTime<Utc>) -> usize {
        let mut dropped = 0;
        for keys in self.buckets.values_mut() {
            let before = keys.len();
            keys.retain(|_, write| match write {
                StagedWrite::Value(entry) => !entry.is_expired_at(now),
                StagedWrite::Tombstone => true,
            });
            dropped += before - keys.len();
        }
        dropped
    }

    /// Merge into the live index.
    ///
    /// Values already expired at `now` are not inserted, but they still
    /// remove any older value for the key so it cannot resurface.
    pub fn apply_to(self, index: &mut StoreIndex, now: DateTime<Utc>) -> ApplyStats {
        let mut stats = ApplyStats::default();
        for (bucket, keys) in self.buckets {
            let live = index.bucket_mut(&bucket);
            for (key, write) in keys {
                match write {
                    StagedWrite::Value(entry) if entry.is_expired_at(now) => {
                        live.remove(&key);
                        stats.expired += 1;
                    }
                    StagedWrite::Value(entry) => {
                        live.insert(key, entry);
                        stats.applied += 1;
                    }
                    StagedWrite::Tombstone => {
                        live.remove(&key);
                        stats.applied += 1;
                    }
                }
            }
        }
        stats
    }

    fn bucket_mut(&mut self, bucket: &str) -> &mut HashMap<String, StagedWrite> {
        self.buckets.entry(bucket.to_string()).or_default()
    }
}
