//! Transactions
//!
//! A `Transaction` is handed to the closure passed to `Engine::update`. It
//! stages writes in a private buffer. Reads of a bucket it has written to
//! are answered from that buffer alone; other buckets are read from the
//! live index. The engine holds its writer lock for the whole closure, so
//! the live view cannot change underneath it.
//!
//! Calling back into the same `Engine` from inside the closure deadlocks.
//! Use the transaction handle instead.

use chrono::{Duration, Utc};

use crate::error::{EmberError, Result};
use crate::index::{Entry, Lookup, StagedWrite, StagingBuffer, StoreIndex};

/// Handle for one `Engine::update` call
pub struct Transaction<'a> {
    staging: &'a mut StagingBuffer,
    live: &'a StoreIndex,
    ttl: Duration,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(staging: &'a mut StagingBuffer, live: &'a StoreIndex, ttl: Duration) -> Self {
        Self { staging, live, ttl }
    }

    /// Stage a write. Its expiry is fixed now, not at commit.
    pub fn set(&mut self, bucket: &str, key: &str, value: impl Into<String>) {
        let entry = Entry::new(value, Utc::now() + self.ttl);
        self.staging.set(bucket, key, entry);
    }

    /// Stage a delete
    pub fn delete(&mut self, bucket: &str, key: &str) {
        self.staging.delete(bucket, key);
    }

    /// Read a key.
    ///
    /// If this transaction has staged anything in `bucket`, the staging
    /// buffer answers: a key it does not hold is `KeyNotFound`, and a staged
    /// value whose TTL already passed fails with `KeyExpired`. Otherwise the
    /// live index is read with `Engine::get` semantics, so an expired live
    /// entry comes back as `Lookup::Expired`.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Lookup> {
        match self.staging.get(bucket, key) {
            Some(StagedWrite::Value(entry)) if entry.is_expired_at(Utc::now()) => {
                Err(EmberError::KeyExpired {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Some(StagedWrite::Value(entry)) => Ok(Lookup::Value(entry.value.clone())),
            Some(StagedWrite::Tombstone) => Err(EmberError::key_not_found(bucket, key)),
            None if self.staging.has_bucket(bucket) => Err(EmberError::key_not_found(bucket, key)),
            None => lookup_live(self.live, bucket, key),
        }
    }

    /// Number of staged writes
    pub fn staged_len(&self) -> usize {
        self.staging.len()
    }
}

/// Non-transactional read against the live index
pub(crate) fn lookup_live(index: &StoreIndex, bucket: &str, key: &str) -> Result<Lookup> {
    let entry = index.get(bucket, key)?;
    if entry.is_expired_at(Utc::now()) {
        Ok(Lookup::Expired)
    } else {
        Ok(Lookup::Value(entry.value.clone()))
    }
}
