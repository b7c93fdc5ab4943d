//! Worker pool: each worker batches rows from the record queue and commits them.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::db_ops::{BatchCommitter, CommitError};
use crate::types::{Batch, FailurePolicy, Row};

use super::context::{ShutdownSignal, WorkerContext};

/// One failed batch. Its rows were rolled back and will not be retried.
#[derive(Debug)]
pub struct BatchFailure {
    pub worker_id: usize,
    /// Position of the batch among the ones this worker sealed.
    pub seq: u64,
    pub rows: usize,
    pub error: CommitError,
}

/// Totals for one worker, sent once when it exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub rows_pulled: usize,
    pub rows_committed: usize,
    pub batches_committed: usize,
    /// Rows dropped without a commit attempt after an abort.
    pub rows_discarded: usize,
}

/// What workers push onto the result queue.
#[derive(Debug)]
pub enum WorkerMessage {
    BatchFailed(BatchFailure),
    Finished(WorkerSummary),
}

struct Worker<C> {
    committer: C,
    ctx: Arc<WorkerContext>,
    shutdown: Arc<ShutdownSignal>,
    result_tx: Sender<WorkerMessage>,
    batch: Batch,
    summary: WorkerSummary,
}

impl<C: BatchCommitter> Worker<C> {
    /// Seal the current batch and commit it. Failures are reported, never propagated.
    fn flush(&mut self) {
        let sealed = self.batch.seal();
        match self
            .committer
            .commit(&sealed, &self.ctx.header, &self.ctx.table)
        {
            Ok(n) => {
                self.summary.rows_committed += n;
                self.summary.batches_committed += 1;
            }
            Err(error) => {
                warn!(
                    "Worker {} batch {} ({} rows) rolled back: {}",
                    self.summary.worker_id,
                    sealed.seq,
                    sealed.len(),
                    error
                );
                if self.ctx.failure_policy == FailurePolicy::Abort {
                    self.shutdown.request_abort();
                }
                let _ = self.result_tx.send(WorkerMessage::BatchFailed(BatchFailure {
                    worker_id: self.summary.worker_id,
                    seq: sealed.seq,
                    rows: sealed.len(),
                    error,
                }));
            }
        }
    }

    fn accept(&mut self, row: Row) {
        self.summary.rows_pulled += 1;
        if self.shutdown.is_aborted() {
            // Keep draining so the dispatcher never blocks on a full queue.
            self.summary.rows_discarded += 1 + self.batch.discard();
            return;
        }
        self.batch.push(row);
        if self.batch.is_full() {
            self.flush();
        }
    }

    fn finish(mut self) {
        if !self.batch.is_empty() {
            if self.shutdown.is_aborted() {
                self.summary.rows_discarded += self.batch.discard();
            } else {
                self.flush();
            }
        }
        debug!(
            "Worker {} completed, committed {} records in {} batches",
            self.summary.worker_id, self.summary.rows_committed, self.summary.batches_committed
        );
        let _ = self
            .result_tx
            .send(WorkerMessage::Finished(self.summary));
    }
}

/// Pull until the queue is closed and drained, flushing full batches as they fill and the
/// partial remainder at the end. Exits only after its last outcome is on the result queue.
pub fn worker_loop<C: BatchCommitter>(
    worker_id: usize,
    committer: C,
    record_rx: Receiver<Row>,
    result_tx: Sender<WorkerMessage>,
    ctx: Arc<WorkerContext>,
    shutdown: Arc<ShutdownSignal>,
) {
    let batch = Batch::new(ctx.batch_size);
    let mut worker = Worker {
        committer,
        ctx,
        shutdown,
        result_tx,
        batch,
        summary: WorkerSummary {
            worker_id,
            ..WorkerSummary::default()
        },
    };
    while let Ok(row) = record_rx.recv() {
        worker.accept(row);
    }
    worker.finish();
}

/// Spawn one worker per committer. Caller keeps the original `result_tx` and must drop it
/// only after every worker has exited.
pub fn spawn_workers<C>(
    committers: Vec<C>,
    record_rx: &Receiver<Row>,
    result_tx: &Sender<WorkerMessage>,
    ctx: Arc<WorkerContext>,
    shutdown: &Arc<ShutdownSignal>,
) -> Vec<JoinHandle<()>>
where
    C: BatchCommitter + 'static,
{
    committers
        .into_iter()
        .enumerate()
        .map(|(worker_id, committer)| {
            let record_rx = record_rx.clone();
            let result_tx = result_tx.clone();
            let ctx = Arc::clone(&ctx);
            let shutdown = Arc::clone(shutdown);
            thread::spawn(move || {
                worker_loop(worker_id, committer, record_rx, result_tx, ctx, shutdown)
            })
        })
        .collect()
}
