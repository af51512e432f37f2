//! WAL record definitions
//!
//! One record per line: comma-joined, escaped fields followed by a CRC32
//! of everything before the final comma.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::index::Entry;

/// Field delimiter
pub const DELIMITER: char = ',';

const TAG_SET: &str = "SET";
const TAG_DELETE: &str = "DELETE";
const TAG_TX_BEGIN: &str = "TX_BEGIN";
const TAG_TX_COMMIT: &str = "TX_COMMIT";

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Set a key to a value with an absolute expiry
    Set {
        bucket: String,
        key: String,
        value: String,
        expire_at: DateTime<Utc>,
    },

    /// Delete a key
    Delete { bucket: String, key: String },

    /// Opens a transaction bracket
    TxBegin,

    /// Closes a transaction bracket; its writes become visible on replay
    TxCommit,
}

/// Why a line could not be decoded into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("missing checksum field")]
    MissingChecksum,

    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("malformed checksum field {0:?}")]
    BadChecksum(String),

    #[error("unknown record tag {0:?}")]
    UnknownTag(String),

    #[error("{tag} expects {expected} fields, found {found}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid expiry timestamp {0:?}")]
    BadTimestamp(String),

    #[error("invalid escape sequence")]
    BadEscape,

    #[error("record is not valid UTF-8")]
    InvalidUtf8,
}

impl Record {
    /// Build a SET record from an index entry
    pub fn set(bucket: &str, key: &str, entry: &Entry) -> Self {
        Record::Set {
            bucket: bucket.to_string(),
            key: key.to_string(),
            value: entry.value.clone(),
            expire_at: entry.expire_at,
        }
    }

    pub fn delete(bucket: &str, key: &str) -> Self {
        Record::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Record::Set { .. } => TAG_SET,
            Record::Delete { .. } => TAG_DELETE,
            Record::TxBegin => TAG_TX_BEGIN,
            Record::TxCommit => TAG_TX_COMMIT,
        }
    }

    /// Encode as a complete line, trailing newline included
    pub fn encode(&self) -> String {
        let mut body = String::from(self.tag());
        match self {
            Record::Set {
                bucket,
                key,
                value,
                expire_at,
            } => {
                push_field(&mut body, bucket);
                push_field(&mut body, key);
                push_field(&mut body, value);
                push_field(&mut body, &format_timestamp(expire_at));
            }
            Record::Delete { bucket, key } => {
                push_field(&mut body, bucket);
                push_field(&mut body, key);
            }
            Record::TxBegin | Record::TxCommit => {}
        }

        let crc = crc32fast::hash(body.as_bytes());
        body.push(DELIMITER);
        body.push_str(&format!("{:08x}", crc));
        body.push('\n');
        body
    }

    /// Decode one line (without its trailing newline)
    pub fn decode(line: &str) -> Result<Self, RecordError> {
        let (body, crc_field) = line
            .rsplit_once(DELIMITER)
            .ok_or(RecordError::MissingChecksum)?;

        if crc_field.len() != 8 {
            return Err(RecordError::BadChecksum(crc_field.to_string()));
        }
        let stored = u32::from_str_radix(crc_field, 16)
            .map_err(|_| RecordError::BadChecksum(crc_field.to_string()))?;
        let computed = crc32fast::hash(body.as_bytes());
        if stored != computed {
            return Err(RecordError::ChecksumMismatch { stored, computed });
        }

        let mut fields = split_fields(body)?;
        let tag = fields.remove(0);

        match tag.as_str() {
            TAG_SET => {
                expect_fields(TAG_SET, &fields, 4)?;
                let mut it = fields.into_iter();
                let bucket = next_field(&mut it);
                let key = next_field(&mut it);
                let value = next_field(&mut it);
                let raw_ts = next_field(&mut it);
                let expire_at = parse_timestamp(&raw_ts)?;
                Ok(Record::Set {
                    bucket,
                    key,
                    value,
                    expire_at,
                })
            }
            TAG_DELETE => {
                expect_fields(TAG_DELETE, &fields, 2)?;
                let mut it = fields.into_iter();
                let bucket = next_field(&mut it);
                let key = next_field(&mut it);
                Ok(Record::Delete { bucket, key })
            }
            TAG_TX_BEGIN => {
                expect_fields(TAG_TX_BEGIN, &fields, 0)?;
                Ok(Record::TxBegin)
            }
            TAG_TX_COMMIT => {
                expect_fields(TAG_TX_COMMIT, &fields, 0)?;
                Ok(Record::TxCommit)
            }
            _ => Err(RecordError::UnknownTag(tag)),
        }
    }
}

/// RFC 3339, UTC, `Z` suffix, sub-second digits only when present
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| RecordError::BadTimestamp(raw.to_string()))
}

// =============================================================================
// Field escaping
// =============================================================================

fn push_field(body: &mut String, raw: &str) {
    body.push(DELIMITER);
    for c in raw.chars() {
        match c {
            '\\' => body.push_str("\\\\"),
            DELIMITER => body.push_str("\\,"),
            '\n' => body.push_str("\\n"),
            '\r' => body.push_str("\\r"),
            other => body.push(other),
        }
    }
}

fn split_fields(body: &str) -> Result<Vec<String>, RecordError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => current.push('\\'),
                Some(DELIMITER) => current.push(DELIMITER),
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                _ => return Err(RecordError::BadEscape),
            },
            DELIMITER => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    Ok(fields)
}

fn expect_fields(tag: &'static str, fields: &[String], expected: usize) -> Result<(), RecordError> {
    if fields.len() != expected {
        return Err(RecordError::FieldCount {
            tag,
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

// Field count is checked before this is called
fn next_field(it: &mut std::vec::IntoIter<String>) -> String {
    it.next().unwrap_or_default()
}
