//! Public and internal types for the batchload API and pipeline.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::db_ops::CommitError;
use crate::utils::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUSY_TIMEOUT, DEFAULT_WORKER_COUNT, RECORD_QUEUE_SLOTS_PER_WORKER,
};

/// One data record: string fields in Header order.
pub type Row = Vec<String>;

/// Column names read once from the first source record. Immutable and shared read-only by workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rows accumulated by one worker. Never holds more than `capacity` rows.
#[derive(Debug)]
pub struct Batch {
    rows: Vec<Row>,
    capacity: usize,
    next_seq: u64,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    /// Append a row. Caller must seal before pushing past capacity.
    pub fn push(&mut self, row: Row) {
        debug_assert!(!self.is_full(), "push into a full batch");
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Hand the accumulated rows off for commit; this batch starts over empty.
    /// Sequence numbers are per worker and increase in sealing order.
    pub fn seal(&mut self) -> SealedBatch {
        let rows = std::mem::replace(&mut self.rows, Vec::with_capacity(self.capacity));
        let seq = self.next_seq;
        self.next_seq += 1;
        SealedBatch { seq, rows }
    }

    /// Drop the accumulated rows without committing. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let n = self.rows.len();
        self.rows.clear();
        n
    }
}

/// A batch that no longer accepts rows. Either fully committed or fully discarded.
#[derive(Debug)]
pub struct SealedBatch {
    pub seq: u64,
    pub rows: Vec<Row>,
}

impl SealedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of one batch commit: rows committed, or why nothing was.
pub type CommitOutcome = std::result::Result<usize, CommitError>;

/// What to do with the rest of the run after a batch fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Count the failure and keep loading.
    #[default]
    Continue,
    /// Stop reading the source; remaining queued rows are discarded, not committed.
    Abort,
}

/// How rows are handed to the database inside a batch transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Buffer the batch and flush it as multi-row inserts on finish.
    #[default]
    Copy,
    /// One parameterized INSERT per row.
    RowByRow,
}

/// Static parameters for one load. Built once, then passed by reference.
#[derive(Clone, Debug)]
pub struct LoadConfig {
    /// Delimited text file; first record is the header.
    pub source: PathBuf,
    /// Target table; its columns must include every header column.
    pub table: String,
    /// Number of concurrent workers.
    pub workers: usize,
    /// Rows per batch (one transaction per batch).
    pub batch_size: usize,
    /// Record queue capacity. When None, `workers * RECORD_QUEUE_SLOTS_PER_WORKER`.
    pub queue_capacity: Option<usize>,
    pub failure_policy: FailurePolicy,
    pub insert_mode: InsertMode,
    /// Per-batch deadline. None means a batch may take as long as it needs.
    pub batch_timeout: Option<Duration>,
    /// How long a worker waits on a locked database before its statement fails.
    pub busy_timeout: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            table: String::new(),
            workers: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: None,
            failure_policy: FailurePolicy::default(),
            insert_mode: InsertMode::default(),
            batch_timeout: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl LoadConfig {
    pub fn new(source: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    /// Effective record queue capacity.
    pub fn record_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.workers * RECORD_QUEUE_SLOTS_PER_WORKER)
    }

    /// Result queue holds one slot per worker.
    pub fn result_queue_capacity(&self) -> usize {
        self.workers
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("worker count must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch size must be at least 1");
        }
        if self.record_queue_capacity() == 0 {
            anyhow::bail!("record queue capacity must be at least 1");
        }
        if self.table.trim().is_empty() {
            anyhow::bail!("target table name is empty");
        }
        Ok(())
    }
}
