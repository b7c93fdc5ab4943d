//! Aggregator: drains the result queue and builds the final report.

use crossbeam_channel::Receiver;
use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::utils::config::MAX_REPORTED_FAILURES;

use super::dispatcher::DispatchStats;
use super::supervisor::SupervisorOutcome;
use super::workers::WorkerMessage;

/// Sums of everything workers reported.
#[derive(Debug, Default)]
pub struct Tally {
    pub rows_pulled: usize,
    pub rows_committed: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub rows_failed: usize,
    pub rows_discarded: usize,
    pub workers_finished: usize,
    /// First failure messages, capped at MAX_REPORTED_FAILURES.
    pub failures: Vec<String>,
}

/// Receive until every sender is gone (the supervisor drops the last one after all workers
/// exit). No database access here.
pub fn drain_results(result_rx: Receiver<WorkerMessage>) -> Tally {
    let mut tally = Tally::default();
    for msg in result_rx.iter() {
        match msg {
            WorkerMessage::BatchFailed(f) => {
                tally.batches_failed += 1;
                tally.rows_failed += f.rows;
                if tally.failures.len() < MAX_REPORTED_FAILURES {
                    tally.failures.push(format!(
                        "worker {} batch {} ({} rows): {}",
                        f.worker_id, f.seq, f.rows, f.error
                    ));
                }
            }
            WorkerMessage::Finished(s) => {
                tally.workers_finished += 1;
                tally.rows_pulled += s.rows_pulled;
                tally.rows_committed += s.rows_committed;
                tally.batches_committed += s.batches_committed;
                tally.rows_discarded += s.rows_discarded;
            }
        }
    }
    tally
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Final numbers for one run. A run with failed batches is "completed with errors", not failed.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    pub rows_dispatched: usize,
    pub rows_skipped: usize,
    /// The source was not read to the end (cancel, abort, or no workers left).
    pub stopped_early: bool,
    pub rows_pulled: usize,
    pub rows_remaining: usize,
    pub rows_committed: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub rows_failed: usize,
    pub rows_discarded: usize,
    pub worker_panics: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub memory_delta_kb: i64,
    pub cancelled: bool,
    pub aborted: bool,
    pub failures: Vec<String>,
}

impl ImportReport {
    pub fn new(
        dispatch: DispatchStats,
        tally: Tally,
        supervisor: SupervisorOutcome,
        elapsed: Duration,
        memory_delta_kb: i64,
    ) -> Self {
        Self {
            rows_dispatched: dispatch.rows_sent,
            rows_skipped: dispatch.rows_skipped,
            stopped_early: dispatch.stopped_early,
            rows_pulled: tally.rows_pulled,
            rows_remaining: supervisor.rows_remaining,
            rows_committed: tally.rows_committed,
            batches_committed: tally.batches_committed,
            batches_failed: tally.batches_failed,
            rows_failed: tally.rows_failed,
            rows_discarded: tally.rows_discarded,
            worker_panics: supervisor.worker_panics,
            elapsed,
            memory_delta_kb,
            cancelled: false,
            aborted: false,
            failures: tally.failures,
        }
    }

    /// Any batch failed, or a worker died.
    pub fn has_errors(&self) -> bool {
        self.batches_failed > 0 || self.worker_panics > 0
    }
}
