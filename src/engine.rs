//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Open the WAL and replay it into the store index (`open` + `load`)
//! - Serve reads and writes under one readers-writer lock
//! - Run transactions against a staging buffer and commit them atomically
//! - Compact the WAL on demand

use std::fs;
use std::path::Path;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::compaction::{Compactor, MergeStats};
use crate::config::{Config, DurabilityMode};
use crate::error::{EmberError, Result};
use crate::index::{Entry, Lookup, StagedWrite, StagingBuffer, StoreIndex};
use crate::txn::{self, Transaction};
use crate::wal::{Record, RecoveryResult, WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: one readers-writer lock
///
/// The lock guards the store index and the WAL handle as one critical
/// section.
///
/// - **Reads** (`get`): shared lock, any number run in parallel
/// - **Writes** (`set`/`delete`/`update`/`merge`): exclusive lock for the
///   whole operation, including the closure passed to `update`
///
/// The lock is not reentrant. Calling the engine from inside an `update`
/// closure deadlocks.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// `config.ttl` converted once at open
    ttl: chrono::Duration,

    state: RwLock<EngineState>,
}

struct EngineState {
    index: StoreIndex,

    /// `None` once a failed compaction has lost the append handle
    wal: Option<WalWriter>,

    loaded: bool,
}

impl Engine {
    /// Open or create the log file. Call `load` before first use.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let ttl = chrono::Duration::from_std(config.ttl)
            .map_err(|e| EmberError::Config(format!("ttl out of range: {}", e)))?;

        if let Some(parent) = config.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let wal = WalWriter::open(&config.log_path, config.wal_sync_strategy)?;
        debug!(path = %config.log_path.display(), "opened WAL");

        Ok(Self {
            config,
            ttl,
            state: RwLock::new(EngineState {
                index: StoreIndex::new(),
                wal: Some(wal),
                loaded: false,
            }),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified log file
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().log_path(path).build();
        Self::open(config)
    }

    /// `open` followed by `load`
    pub fn start(config: Config) -> Result<Self> {
        let engine = Self::open(config)?;
        engine.load()?;
        Ok(engine)
    }

    /// Rebuild the store index from the WAL.
    ///
    /// Also repairs the log tail: a torn last line and an unterminated
    /// transaction bracket are cut off so later appends start clean.
    pub fn load(&self) -> Result<RecoveryResult> {
        let mut state = self.state.write();

        let (index, result) = WalRecovery::replay(&self.config.log_path, Utc::now())?;

        if result.was_truncated {
            warn!(
                valid_len = result.valid_len,
                file_len = result.file_len,
                "truncating incomplete WAL tail"
            );
            let wal = state.wal.as_mut().ok_or(EmberError::WalUnavailable)?;
            wal.truncate_to(result.valid_len)?;
        }

        info!(
            applied = result.records_applied,
            skipped = result.records_skipped,
            expired = result.records_expired,
            committed = result.transactions_committed,
            discarded = result.transactions_discarded,
            keys = index.key_count(),
            "WAL replay complete"
        );

        state.index = index;
        state.loaded = true;
        Ok(result)
    }

    /// Get a value.
    ///
    /// An expired entry is reported as `Lookup::Expired`, not as an error,
    /// and stays in memory.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Lookup> {
        let state = self.state.read();
        if !state.loaded {
            return Err(EmberError::NotLoaded);
        }
        txn::lookup_live(&state.index, bucket, key)
    }

    /// Set a value with an expiry of now + TTL, creating the bucket if needed
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append SET to the WAL
    /// 3. Write to the index
    pub fn set(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.loaded {
            return Err(EmberError::NotLoaded);
        }

        let entry = Entry::new(value, Utc::now() + self.ttl);
        self.append(&mut state, &Record::set(bucket, key, &entry))?;
        state.index.insert(bucket, key, entry);

        debug!(bucket, key, "set");
        Ok(())
    }

    /// Delete a key. Deleting a missing key is not an error; the DELETE
    /// record is logged regardless.
    pub fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.loaded {
            return Err(EmberError::NotLoaded);
        }

        self.append(&mut state, &Record::delete(bucket, key))?;
        let existed = state.index.remove(bucket, key).is_some();

        debug!(bucket, key, existed, "delete");
        Ok(())
    }

    /// Run `f` as one atomic transaction.
    ///
    /// If `f` fails, nothing reaches the WAL or the index and its error is
    /// returned unchanged. Otherwise the staged writes are logged as
    /// `TX_BEGIN`, one record each, `TX_COMMIT`, synced, and only then
    /// applied to the index. Values whose TTL ran out before commit are
    /// dropped.
    pub fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> std::result::Result<T, E>,
        E: From<EmberError>,
    {
        let mut state = self.state.write();
        if !state.loaded {
            return Err(EmberError::NotLoaded.into());
        }

        let mut staging = StagingBuffer::new();
        let output = {
            let mut tx = Transaction::new(&mut staging, &state.index, self.ttl);
            match f(&mut tx) {
                Ok(output) => output,
                Err(e) => {
                    debug!(staged = staging.len(), "transaction rolled back");
                    return Err(e);
                }
            }
        };

        let now = Utc::now();
        let mut records = Vec::with_capacity(staging.len() + 2);
        records.push(Record::TxBegin);
        for (bucket, key, write) in staging.iter() {
            match write {
                StagedWrite::Value(entry) if entry.is_expired_at(now) => {}
                StagedWrite::Value(entry) => records.push(Record::set(bucket, key, entry)),
                StagedWrite::Tombstone => records.push(Record::delete(bucket, key)),
            }
        }
        records.push(Record::TxCommit);

        if records.len() > 2 {
            let wal = state.wal.as_mut().ok_or(EmberError::WalUnavailable)?;
            // The commit marker must be on disk before the index changes
            wal.commit_batch(&records)
                .map_err(|e| EmberError::WalWrite(e.to_string()))?;
        }

        let dropped = staging.retain_live(now);
        let stats = staging.apply_to(&mut state.index, now);
        debug!(applied = stats.applied, dropped, "transaction committed");

        Ok(output)
    }

    /// Compact the WAL down to one SET per live key.
    ///
    /// If the snapshot cannot be written the old log is left as it was.
    /// A failure after the old handle is closed is returned as
    /// `EmberError::Compaction`; if the log cannot be reopened at all,
    /// later writes fail with `EmberError::WalUnavailable`.
    pub fn merge(&self) -> Result<MergeStats> {
        let mut state = self.state.write();
        if !state.loaded {
            return Err(EmberError::NotLoaded);
        }

        let log_path = self.config.log_path.as_path();
        let temp_path = Compactor::temp_path(log_path);
        let now = Utc::now();

        let mut stats = match Compactor::write_snapshot(&state.index, &temp_path, now) {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "compaction aborted, WAL untouched");
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        // Close the old handle before the rename
        if let Some(mut old) = state.wal.take() {
            if let Err(e) = old.sync() {
                warn!(error = %e, "failed to sync WAL before compaction");
            }
        }

        if let Err(e) = Compactor::install(&temp_path, log_path) {
            error!(error = %e, "failed to install compacted WAL");
            let _ = fs::remove_file(&temp_path);
            state.wal = WalWriter::open(log_path, self.config.wal_sync_strategy).ok();
            return Err(EmberError::Compaction(format!("rename failed: {}", e)));
        }

        let reopened = WalWriter::open(log_path, self.config.wal_sync_strategy)
            .map_err(|e| EmberError::Compaction(format!("reopen failed: {}", e)))?;
        state.wal = Some(reopened);

        if self.config.evict_expired_on_merge {
            stats.evicted = state.index.evict_expired(now) as u64;
        }

        info!(
            written = stats.records_written,
            expired = stats.expired_skipped,
            evicted = stats.evicted,
            "WAL compacted"
        );
        Ok(stats)
    }

    /// Force the WAL to disk
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        state.wal.as_mut().ok_or(EmberError::WalUnavailable)?.sync()
    }

    /// Close the engine gracefully, syncing the WAL
    pub fn close(self) -> Result<()> {
        let mut state = self.state.into_inner();
        match state.wal.as_mut() {
            Some(wal) => wal.sync(),
            None => Ok(()),
        }
    }

    /// Append under the configured durability mode.
    ///
    /// Relaxed: a failed append is logged and the caller proceeds.
    /// Strict: the failure is returned. A lost handle fails in both.
    fn append(&self, state: &mut EngineState, record: &Record) -> Result<()> {
        let wal = state.wal.as_mut().ok_or(EmberError::WalUnavailable)?;
        match wal.append(record) {
            Ok(()) => Ok(()),
            Err(e) => match self.config.durability {
                DurabilityMode::Relaxed => {
                    warn!(error = %e, record = record.tag(), "WAL append failed, applying in memory only");
                    Ok(())
                }
                DurabilityMode::Strict => Err(EmberError::WalWrite(e.to_string())),
            },
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the WAL path
    pub fn log_path(&self) -> &Path {
        &self.config.log_path
    }

    /// Get the number of buckets
    pub fn bucket_count(&self) -> usize {
        self.state.read().index.bucket_count()
    }

    /// Get the number of resident keys, expired ones included
    pub fn key_count(&self) -> usize {
        self.state.read().index.key_count()
    }

    /// Whether `load` has run
    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
