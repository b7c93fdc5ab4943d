//! Record source: delimited text, header first, then one row per record.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::types::{Header, Row};

/// Why a single record was not turned into a row. Recoverable: the record is skipped.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("parse error: {0}")]
    Parse(#[from] csv::Error),
}

/// Sequential reader over a CSV source. Yields `Ok(row)` per well-formed record and `Err` per
/// bad one; ends at end of input (or at an I/O error, which is logged).
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    header: Header,
    record: csv::StringRecord,
    done: bool,
}

impl CsvSource<File> {
    /// Open `path` and read its header. Failing here is a setup error.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open source {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("read header of {}", path.display()))
    }
}

impl<R: Read> CsvSource<R> {
    /// Wrap any reader and consume its first record as the header.
    pub fn from_reader(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);
        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record).context("read header record")? {
            anyhow::bail!("source is empty (no header record)");
        }
        let columns: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        if columns.iter().any(|c| c.is_empty()) {
            anyhow::bail!("header has an empty column name");
        }
        Ok(Self {
            reader,
            header: Header::new(columns),
            record,
            done: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = std::result::Result<Row, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                let expected = self.header.len();
                let found = self.record.len();
                if found != expected {
                    let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                    return Some(Err(RowError::FieldCount {
                        line,
                        expected,
                        found,
                    }));
                }
                Some(Ok(self.record.iter().map(str::to_string).collect()))
            }
            Err(e) => {
                // The reader cannot resume after an I/O failure; anything else is per-record.
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    log::error!("Stopped reading source: {}", e);
                    self.done = true;
                    return None;
                }
                Some(Err(RowError::Parse(e)))
            }
        }
    }
}
