//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::WalSyncStrategy;
use crate::error::Result;
use super::Record;

/// Appends records to the WAL file
///
/// Each append is encoded into one buffer and handed to the OS with a
/// single write, so a process crash never loses an acknowledged record.
/// Whether it also reaches the disk depends on the sync strategy.
///
/// An append either lands whole or not at all: if the write or its sync
/// fails, the file is cut back to its length before the append and no
/// bytes are kept around for a later write to carry out.
pub struct WalWriter {
    path: PathBuf,
    file: File,
    sync_strategy: WalSyncStrategy,

    /// Length of the file up to the last acknowledged append
    len: u64,

    /// A failed append could not be rolled back, so bytes past `len` may
    /// be a partial record. Cleared before the next append is written.
    dirty_tail: bool,

    unsynced: usize,
    records_written: u64,
}

impl WalWriter {
    /// Open or create a WAL file in append mode
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::from_file(path, file, sync_strategy)
    }

    fn from_file(path: &Path, file: File, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            sync_strategy,
            len,
            dirty_tail: false,
            unsynced: 0,
            records_written: 0,
        })
    }

    /// Append one record
    pub fn append(&mut self, record: &Record) -> Result<()> {
        self.write_all_or_nothing(record.encode().as_bytes(), 1, false)
    }

    /// Append several records with a single write.
    ///
    /// A crash part-way leaves a prefix of the batch on disk, possibly
    /// ending in a torn line.
    pub fn append_batch(&mut self, records: &[Record]) -> Result<()> {
        self.write_all_or_nothing(&encode_batch(records), records.len(), false)
    }

    /// Append a batch and fsync it regardless of the sync strategy.
    /// On error none of the batch is left in the file.
    pub fn commit_batch(&mut self, records: &[Record]) -> Result<()> {
        self.write_all_or_nothing(&encode_batch(records), records.len(), true)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Cut the file back to `len` bytes. Later appends land after it.
    pub fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.len = len;
        self.dirty_tail = false;
        self.sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    fn write_all_or_nothing(&mut self, bytes: &[u8], count: usize, force_sync: bool) -> Result<()> {
        if self.dirty_tail {
            self.truncate_to(self.len)?;
        }

        let start = self.len;
        let result = match self.file.write_all(bytes) {
            Ok(()) => self.after_write(count, force_sync),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                self.len = start + bytes.len() as u64;
                self.records_written += count as u64;
                Ok(())
            }
            Err(e) => {
                self.roll_back(start);
                Err(e)
            }
        }
    }

    fn roll_back(&mut self, len: u64) {
        if let Err(e) = self.file.set_len(len) {
            warn!(error = %e, len, "failed to roll back WAL append, will retry before next write");
            self.dirty_tail = true;
        }
    }

    fn after_write(&mut self, count: usize, force_sync: bool) -> Result<()> {
        self.unsynced += count;
        match self.sync_strategy {
            _ if force_sync => self.sync(),
            WalSyncStrategy::EveryWrite => self.sync(),
            WalSyncStrategy::EveryNEntries { count } if self.unsynced >= count => self.sync(),
            WalSyncStrategy::EveryNEntries { .. } | WalSyncStrategy::OsBuffered => Ok(()),
        }
    }

    /// A writer whose every append fails, for exercising failure paths
    #[cfg(test)]
    pub(crate) fn open_read_only(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(path, file, WalSyncStrategy::EveryWrite)
    }
}

fn encode_batch(records: &[Record]) -> Vec<u8> {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&record.encode());
    }
    buf.into_bytes()
}
