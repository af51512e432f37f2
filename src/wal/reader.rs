//! WAL Reader
//!
//! Handles reading lines from the WAL file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use super::{Record, RecordError};

/// One physical line of the log
#[derive(Debug, Clone, PartialEq)]
pub struct WalLine {
    /// Byte offset where the line starts
    pub offset: u64,

    /// Byte offset just past the line (and its newline)
    pub end: u64,

    pub outcome: LineOutcome,
}

/// What a line decoded to
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(Record),

    /// A complete line that failed to decode
    Corrupt(RecordError),

    /// The final line has no newline: a write interrupted by a crash
    Torn,
}

/// Reads lines from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    position: u64,
    buf: Vec<u8>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            buf: Vec::new(),
        })
    }

    /// Read the next line from the WAL
    pub fn next_line(&mut self) -> Result<Option<WalLine>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }

        let offset = self.position;
        self.position += read as u64;

        let outcome = match self.buf.split_last() {
            Some((b'\n', body)) => match std::str::from_utf8(body) {
                Ok(text) => match Record::decode(text) {
                    Ok(record) => LineOutcome::Record(record),
                    Err(e) => LineOutcome::Corrupt(e),
                },
                Err(_) => LineOutcome::Corrupt(RecordError::InvalidUtf8),
            },
            _ => LineOutcome::Torn,
        };

        Ok(Some(WalLine {
            offset,
            end: self.position,
            outcome,
        }))
    }

    /// Iterate over all lines
    pub fn lines(self) -> WalIterator {
        WalIterator { reader: self }
    }
}

/// Iterator over WAL lines
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = Result<WalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_line().transpose()
    }
}
