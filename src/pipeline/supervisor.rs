//! Supervisor: the "all workers done" barrier in front of the result queue.

use crossbeam_channel::{Receiver, Sender};
use log::error;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::types::Row;

use super::context::ShutdownSignal;
use super::workers::WorkerMessage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupervisorOutcome {
    /// Worker threads that panicked instead of reporting.
    pub worker_panics: usize,
    /// Rows still in the record queue once every worker had exited. Zero on a normal run.
    pub rows_remaining: usize,
}

/// Join every worker, then close the result queue by dropping the last sender.
///
/// Holds a record queue receiver so that, if workers died early, it can drain what is left
/// (counting it) and the dispatcher is never stuck on a full queue.
pub fn spawn_supervisor(
    worker_handles: Vec<JoinHandle<()>>,
    record_rx: Receiver<Row>,
    result_tx: Sender<WorkerMessage>,
    shutdown: Arc<ShutdownSignal>,
) -> JoinHandle<SupervisorOutcome> {
    thread::spawn(move || {
        let mut outcome = SupervisorOutcome::default();
        for (worker_id, handle) in worker_handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!("Worker {} panicked; its open batch was not committed", worker_id);
                outcome.worker_panics += 1;
            }
        }
        if outcome.worker_panics > 0 {
            shutdown.request_abort();
        }
        outcome.rows_remaining = record_rx.iter().count();
        drop(result_tx);
        outcome
    })
}
