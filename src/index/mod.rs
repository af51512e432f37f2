//! Store Index Module
//!
//! In-memory view of every bucket, rebuilt from the WAL on startup.
//!
//! ## Responsibilities
//! - Map bucket name → key → `Entry`
//! - Create buckets implicitly on first write
//! - Stage transactional writes in an isolated buffer
//! - Merge a staged batch into the live index, dropping expired entries
//!
//! ## Expiry
//! Entries are never evicted on read. An expired entry stays resident until
//! a merge (with eviction enabled) or a restart filters it out.

mod staging;
mod table;

pub use staging::{ApplyStats, StagedWrite, StagingBuffer};
pub use table::StoreIndex;

use chrono::{DateTime, Utc};

/// A stored value plus its absolute expiration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: String,
    pub expire_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(value: impl Into<String>, expire_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expire_at,
        }
    }

    /// An entry is live strictly before its expiry instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }
}

/// Result of a non-transactional read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Live value
    Value(String),

    /// The key exists but its TTL has passed. Not an error, and the
    /// entry is not removed.
    Expired,
}

impl Lookup {
    /// The live value, if any
    pub fn value(&self) -> Option<&str> {
        match self {
            Lookup::Value(v) => Some(v),
            Lookup::Expired => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Lookup::Expired)
    }
}
