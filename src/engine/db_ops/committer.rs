//! Batch committer: one transaction per sealed batch, all rows or none.

use log::{debug, warn};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::types::{CommitOutcome, Header, InsertMode, SealedBatch};
use crate::utils::config::{DEADLINE_CHECK_OPS, DEFAULT_BUSY_TIMEOUT};

use super::CopyIn;

/// Why a batch was rolled back. The batch's rows are not retried.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("begin transaction: {0}")]
    Begin(#[source] rusqlite::Error),
    #[error("prepare insert: {0}")]
    Prepare(#[source] rusqlite::Error),
    #[error("insert row {row}: {source}")]
    Insert {
        row: usize,
        #[source]
        source: rusqlite::Error,
    },
    #[error("row {row} has {found} fields, header has {expected}")]
    FieldCount {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("flush bulk insert: {0}")]
    Flush(#[source] rusqlite::Error),
    #[error("commit transaction: {0}")]
    Commit(#[source] rusqlite::Error),
    #[error("batch exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl CommitError {
    /// SQLite result code behind this error, if it came from SQLite.
    pub fn sqlite_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Begin(e) | Self::Prepare(e) | Self::Flush(e) | Self::Commit(e) => {
                e.sqlite_error_code()
            }
            Self::Insert { source, .. } => source.sqlite_error_code(),
            Self::FieldCount { .. } | Self::DeadlineExceeded(_) => None,
        }
    }
}

/// Commits one sealed batch atomically. Each worker owns its own committer, so
/// implementations never share a transaction across workers.
pub trait BatchCommitter: Send {
    fn commit(&mut self, batch: &SealedBatch, header: &Header, table: &str) -> CommitOutcome;
}

/// [`BatchCommitter`] over a dedicated SQLite connection.
///
/// With a deadline, the batch's lock wait is capped at the deadline and a progress handler
/// interrupts statements still running once it has passed.
pub struct SqliteCommitter {
    conn: Connection,
    mode: InsertMode,
    deadline: Option<Duration>,
    busy_timeout: Duration,
}

impl SqliteCommitter {
    pub fn new(conn: Connection, mode: InsertMode, deadline: Option<Duration>) -> Self {
        Self {
            conn,
            mode,
            deadline,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Lock wait the connection was opened with; restored after each deadline-bound batch.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin → stream rows → finish → commit. Any early return drops the transaction,
    /// which rolls it back; only a successful `commit` makes the rows visible.
    fn run_batch(
        &mut self,
        batch: &SealedBatch,
        header: &Header,
        table: &str,
        started: Instant,
    ) -> CommitOutcome {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(CommitError::Begin)?;

        if let Some(limit) = self.deadline {
            tx.progress_handler(DEADLINE_CHECK_OPS, Some(move || started.elapsed() > limit))
                .map_err(CommitError::Begin)?;
        }
        let written = stream_rows(&tx, batch, header, table, self.mode, started, self.deadline);
        // Disarm before COMMIT or the rollback on drop, so neither can be interrupted.
        if self.deadline.is_some() {
            tx.progress_handler(0, None::<fn() -> bool>)
                .map_err(CommitError::Commit)?;
        }
        let written = written?;

        tx.commit().map_err(CommitError::Commit)?;
        Ok(written)
    }

    /// Interrupts and lock waits cut short by the deadline become `DeadlineExceeded`.
    fn classify(&self, error: CommitError, started: Instant) -> CommitError {
        let Some(limit) = self.deadline else {
            return error;
        };
        match error.sqlite_code() {
            Some(ErrorCode::OperationInterrupted) => CommitError::DeadlineExceeded(limit),
            Some(ErrorCode::DatabaseBusy) if started.elapsed() >= limit => {
                CommitError::DeadlineExceeded(limit)
            }
            _ => error,
        }
    }
}

/// Push every row of `batch` through one `CopyIn` on `conn` and finish it.
fn stream_rows(
    conn: &Connection,
    batch: &SealedBatch,
    header: &Header,
    table: &str,
    mode: InsertMode,
    started: Instant,
    deadline: Option<Duration>,
) -> Result<usize, CommitError> {
    let mut copy = CopyIn::open(conn, table, header, mode)?;
    for row in &batch.rows {
        copy.write_row(row)?;
        check_deadline(started, deadline)?;
    }
    copy.finish()
}

/// Err once `deadline` has passed since `started`.
fn check_deadline(started: Instant, deadline: Option<Duration>) -> Result<(), CommitError> {
    match deadline {
        Some(limit) if started.elapsed() > limit => Err(CommitError::DeadlineExceeded(limit)),
        _ => Ok(()),
    }
}

impl BatchCommitter for SqliteCommitter {
    fn commit(&mut self, batch: &SealedBatch, header: &Header, table: &str) -> CommitOutcome {
        let started = Instant::now();
        if let Some(limit) = self.deadline {
            self.conn
                .busy_timeout(self.busy_timeout.min(limit))
                .map_err(CommitError::Begin)?;
        }

        let outcome = self.run_batch(batch, header, table, started);

        if self.deadline.is_some() {
            if let Err(e) = self.conn.busy_timeout(self.busy_timeout) {
                warn!("Could not restore busy timeout: {}", e);
            }
        }
        let written = outcome.map_err(|e| self.classify(e, started))?;
        debug!(
            "Committed batch {} ({} rows) in {:?}",
            batch.seq,
            written,
            started.elapsed()
        );
        Ok(written)
    }
}
