//! Log compaction (merge)
//!
//! Rewrites the WAL so it holds exactly one SET record per live key:
//! 1. Write a snapshot of the index to `<log>.compact` and fsync it
//! 2. Rename it over the log
//! 3. Fsync the parent directory so the rename is durable
//!
//! The engine closes its append handle between 1 and 2 and reopens it
//! after 3. The in-memory index is the canonical state and is only
//! changed here when eviction is enabled.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::index::StoreIndex;
use crate::wal::Record;

/// Counts from one merge
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// SET records in the new log
    pub records_written: u64,

    /// Expired entries left out of the new log
    pub expired_skipped: u64,

    /// Expired entries dropped from memory (eviction enabled only)
    pub evicted: u64,
}

/// Writes and installs compacted logs
pub struct Compactor;

impl Compactor {
    /// Path of the temporary snapshot for `log_path`
    pub fn temp_path(log_path: &Path) -> PathBuf {
        let mut name = OsString::from(log_path.as_os_str());
        name.push(".compact");
        PathBuf::from(name)
    }

    /// Write every entry live at `now` to `temp_path`, replacing any
    /// leftover from an earlier attempt.
    pub fn write_snapshot(
        index: &StoreIndex,
        temp_path: &Path,
        now: DateTime<Utc>,
    ) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        let mut out = BufWriter::new(File::create(temp_path)?);

        for (bucket, key, entry) in index.iter() {
            if entry.is_expired_at(now) {
                stats.expired_skipped += 1;
                continue;
            }
            out.write_all(Record::set(bucket, key, entry).encode().as_bytes())?;
            stats.records_written += 1;
        }

        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(stats)
    }

    /// Atomically replace `log_path` with `temp_path`
    pub fn install(temp_path: &Path, log_path: &Path) -> Result<()> {
        fs::rename(temp_path, log_path)?;
        Self::sync_parent_dir(log_path)
    }

    #[cfg(unix)]
    fn sync_parent_dir(path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(_path: &Path) -> Result<()> {
        Ok(())
    }
}
