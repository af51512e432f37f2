//! WAL Recovery
//!
//! Rebuilds the store index by replaying the WAL from the beginning.
//!
//! Records outside a bracket apply directly to the index. Records between
//! `TX_BEGIN` and `TX_COMMIT` are staged and applied together at the
//! commit. A bracket still open at end-of-log is discarded.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::{Entry, StagingBuffer, StoreIndex};
use super::{LineOutcome, Record, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// SET/DELETE records that took effect on the index
    pub records_applied: u64,

    /// Corrupt, malformed, or out-of-place records skipped
    pub records_skipped: u64,

    /// SET records already expired at replay time
    pub records_expired: u64,

    /// Brackets closed by TX_COMMIT
    pub transactions_committed: u64,

    /// Brackets abandoned (restarted by another TX_BEGIN, or open at EOF)
    pub transactions_discarded: u64,

    /// Length of the log prefix worth keeping: excludes a torn final line
    /// and an unterminated transaction bracket
    pub valid_len: u64,

    /// Length of the log file on disk
    pub file_len: u64,

    /// Whether `valid_len < file_len`
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Replay a WAL file into a fresh index.
    ///
    /// Entries expired at `now` are dropped. A missing file replays as empty.
    pub fn replay(path: &Path, now: DateTime<Utc>) -> Result<(StoreIndex, RecoveryResult)> {
        let mut index = StoreIndex::new();
        let mut result = RecoveryResult::default();

        if !path.exists() {
            return Ok((index, result));
        }

        // Open bracket: its staged writes and the offset of its TX_BEGIN
        let mut open_tx: Option<(StagingBuffer, u64)> = None;
        let mut valid_len = 0;

        for line in WalReader::open(path)?.lines() {
            let line = line?;
            match line.outcome {
                LineOutcome::Torn => {
                    warn!(offset = line.offset, "torn record at end of WAL, ignoring");
                    break;
                }
                LineOutcome::Corrupt(e) => {
                    warn!(offset = line.offset, error = %e, "skipping malformed WAL record");
                    result.records_skipped += 1;
                }
                LineOutcome::Record(Record::TxBegin) => {
                    if open_tx.is_some() {
                        debug!(offset = line.offset, "TX_BEGIN inside open transaction, restarting batch");
                        result.transactions_discarded += 1;
                    }
                    open_tx = Some((StagingBuffer::new(), line.offset));
                }
                LineOutcome::Record(Record::TxCommit) => match open_tx.take() {
                    Some((staged, _)) => {
                        let stats = staged.apply_to(&mut index, now);
                        result.records_applied += stats.applied;
                        result.records_expired += stats.expired;
                        result.transactions_committed += 1;
                    }
                    None => {
                        warn!(offset = line.offset, "TX_COMMIT without TX_BEGIN, skipping");
                        result.records_skipped += 1;
                    }
                },
                LineOutcome::Record(Record::Set {
                    bucket,
                    key,
                    value,
                    expire_at,
                }) => {
                    let entry = Entry::new(value, expire_at);
                    match open_tx.as_mut() {
                        Some((staged, _)) => staged.set(&bucket, &key, entry),
                        None if entry.is_expired_at(now) => {
                            // Shadow any older value instead of letting it resurface
                            index.bucket_mut(&bucket).remove(&key);
                            result.records_expired += 1;
                        }
                        None => {
                            index.insert(&bucket, &key, entry);
                            result.records_applied += 1;
                        }
                    }
                }
                LineOutcome::Record(Record::Delete { bucket, key }) => match open_tx.as_mut() {
                    Some((staged, _)) => staged.delete(&bucket, &key),
                    None => {
                        index.remove(&bucket, &key);
                        result.records_applied += 1;
                    }
                },
            }
            valid_len = line.end;
        }

        if let Some((staged, begin)) = open_tx {
            warn!(
                offset = begin,
                staged = staged.len(),
                "discarding unterminated transaction at end of WAL"
            );
            result.transactions_discarded += 1;
            valid_len = begin;
        }

        result.file_len = std::fs::metadata(path)?.len();
        result.valid_len = valid_len;
        result.was_truncated = valid_len < result.file_len;

        Ok((index, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result) = Self::replay(path, Utc::now())?;
        Ok(result)
    }
}
