//! Configuration for EmberKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EmberError, Result};

/// Default TTL window applied to every write (10 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Longest accepted TTL (1000 years). `now + ttl` must stay inside the
/// range of timestamps chrono can represent.
pub const MAX_TTL: Duration = Duration::from_secs(1000 * 365 * 24 * 60 * 60);

/// Main configuration for an EmberKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the write-ahead log file. Compaction writes a sibling
    /// `<log_path>.compact` file and renames it over this path.
    pub log_path: PathBuf,

    /// Engine-wide time-to-live added to "now" on every write
    pub ttl: Duration,

    /// Drop expired entries from memory when the log is compacted
    pub evict_expired_on_merge: bool,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// What happens to a `set`/`delete` whose log append fails
    pub durability: DurabilityMode,

    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address (adapter only)
    pub listen_addr: String,
}

/// Policy for log append failures on the non-transactional write path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Log the failure and apply the mutation to memory anyway.
    /// Memory may diverge from disk until the next successful merge.
    #[default]
    Relaxed,

    /// Return the failure and leave memory untouched
    Strict,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },

    /// Leave flushing to the OS. Transaction commits and compaction
    /// still fsync.
    OsBuffered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("./emberkv.log"),
            ttl: DEFAULT_TTL,
            evict_expired_on_merge: false,
            durability: DurabilityMode::Relaxed,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(EmberError::Config("ttl must be greater than zero".into()));
        }
        if self.ttl > MAX_TTL || chrono::Duration::from_std(self.ttl).is_err() {
            return Err(EmberError::Config(format!("ttl out of range: {:?}", self.ttl)));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(EmberError::Config(
                "EveryNEntries count must be greater than zero".into(),
            ));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(EmberError::Config("log_path must not be empty".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the WAL file path
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// Set the TTL window
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Enable or disable eviction of expired entries during merge
    pub fn evict_expired_on_merge(mut self, evict: bool) -> Self {
        self.config.evict_expired_on_merge = evict;
        self
    }

    /// Set the durability mode
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.config.durability = mode;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
