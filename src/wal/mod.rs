//! Write-Ahead Log (WAL) Module
//!
//! The durable source of truth. The in-memory index is a cache rebuilt
//! from it on startup.
//!
//! ## Responsibilities
//! - Append records before (or as part of) each mutation
//! - CRC32 checksums for corruption detection
//! - Transaction brackets for all-or-nothing replay
//! - Crash recovery and replay
//!
//! ## File Format
//! UTF-8 text, one record per line:
//! ```text
//! SET,<bucket>,<key>,<value>,<expireAt RFC 3339>,<crc32>
//! DELETE,<bucket>,<key>,<crc32>
//! TX_BEGIN,<crc32>
//! TX_COMMIT,<crc32>
//! ```
//! Backslash, comma, newline and carriage return inside a field are
//! escaped as `\\`, `\,`, `\n`, `\r`. The CRC32 (8 lowercase hex digits)
//! covers every byte before the final comma.

mod record;
mod writer;
mod reader;
mod recovery;

pub use record::{format_timestamp, parse_timestamp, Record, RecordError, DELIMITER};
pub use writer::WalWriter;
pub use reader::{LineOutcome, WalIterator, WalLine, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
