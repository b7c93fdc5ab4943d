use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::engine::db_ops::BatchCommitter;
use crate::pipeline;
use crate::source::RowError;
use crate::types::{Header, LoadConfig, Row};
use crate::utils::memory::{MemoryProbe, memory_delta_kb};

use super::aggregator::ImportReport;

/// Run the whole load: dispatcher → record queue → workers → result queue → aggregator.
///
/// `committers` supplies one committer per worker (its length must equal `cfg.workers`).
/// Per-row and per-batch failures only show up in the report; `Err` means the pipeline
/// itself could not run.
pub fn run_pipeline<I, C>(
    rows: I,
    header: Header,
    committers: Vec<C>,
    cfg: &LoadConfig,
    shutdown: Arc<pipeline::ShutdownSignal>,
) -> Result<ImportReport>
where
    I: Iterator<Item = Result<Row, RowError>> + Send + 'static,
    C: BatchCommitter + 'static,
{
    cfg.validate()?;
    if committers.len() != cfg.workers {
        anyhow::bail!(
            "got {} committers for {} workers",
            committers.len(),
            cfg.workers
        );
    }

    let start_time = Instant::now();
    let mut probe = MemoryProbe::new();
    let mem_start = probe.resident_bytes();

    let channels = pipeline::create_pipeline_channels(
        cfg.record_queue_capacity(),
        cfg.result_queue_capacity(),
    );
    debug!(
        "Pipeline: {} workers, batch size {}, record queue {}, table {}",
        cfg.workers,
        cfg.batch_size,
        cfg.record_queue_capacity(),
        cfg.table
    );

    let ctx = Arc::new(pipeline::WorkerContext::new(header, cfg));
    let worker_handles = pipeline::spawn_workers(
        committers,
        &channels.record_rx,
        &channels.result_tx,
        ctx,
        &shutdown,
    );

    // The supervisor owns the last result sender; dropping it is what ends the drain below.
    let supervisor_handle = pipeline::spawn_supervisor(
        worker_handles,
        channels.record_rx,
        channels.result_tx,
        Arc::clone(&shutdown),
    );
    let dispatch_handle =
        pipeline::spawn_dispatcher(channels.record_tx, rows, Arc::clone(&shutdown));

    let tally = pipeline::drain_results(channels.result_rx);
    let elapsed = start_time.elapsed();
    let mem_delta = memory_delta_kb(mem_start, probe.resident_bytes());

    let dispatch = dispatch_handle
        .join()
        .map_err(|_| anyhow::anyhow!("dispatcher thread panicked"))?;
    let supervisor = supervisor_handle
        .join()
        .map_err(|_| anyhow::anyhow!("supervisor thread panicked"))?;

    let mut report = ImportReport::new(dispatch, tally, supervisor, elapsed, mem_delta);
    report.cancelled = shutdown.is_cancelled();
    report.aborted = shutdown.is_aborted();

    info!(
        "Load finished: {} committed, {} batches failed, {} skipped",
        report.rows_committed, report.batches_failed, report.rows_skipped
    );
    if report.rows_remaining > 0 {
        warn!(
            "{} rows were left in the record queue at shutdown",
            report.rows_remaining
        );
    }
    Ok(report)
}
