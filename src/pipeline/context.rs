//! Pipeline context: channels, shared stop flags, and the read-only settings every worker sees.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{FailurePolicy, Header, LoadConfig, Row};

use super::workers::WorkerMessage;

/// Stop requests raised during a run. Cancel stops reading the source but still commits what
/// was already queued; abort also makes workers discard everything they have not committed.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    cancel: AtomicBool,
    abort: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// True when the dispatcher should stop reading the source.
    pub fn stop_dispatch(&self) -> bool {
        self.is_cancelled() || self.is_aborted()
    }
}

/// Read-only settings shared by all workers for one run.
#[derive(Debug)]
pub struct WorkerContext {
    pub header: Header,
    pub table: String,
    pub batch_size: usize,
    pub failure_policy: FailurePolicy,
}

impl WorkerContext {
    pub fn new(header: Header, cfg: &LoadConfig) -> Self {
        Self {
            header,
            table: cfg.table.clone(),
            batch_size: cfg.batch_size,
            failure_policy: cfg.failure_policy,
        }
    }
}

/// Record queue (dispatcher → workers) and result queue (workers → aggregator). Both bounded.
pub struct PipelineChannels {
    pub record_tx: Sender<Row>,
    pub record_rx: Receiver<Row>,
    pub result_tx: Sender<WorkerMessage>,
    pub result_rx: Receiver<WorkerMessage>,
}

pub fn create_pipeline_channels(record_cap: usize, result_cap: usize) -> PipelineChannels {
    let (record_tx, record_rx) = bounded::<Row>(record_cap);
    let (result_tx, result_rx) = bounded::<WorkerMessage>(result_cap);
    PipelineChannels {
        record_tx,
        record_rx,
        result_tx,
        result_rx,
    }
}
