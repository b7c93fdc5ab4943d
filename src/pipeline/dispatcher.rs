//! Dispatcher: reads the source in order and feeds the record queue.

use crossbeam_channel::Sender;
use log::{info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::source::RowError;
use crate::types::Row;

use super::context::ShutdownSignal;

/// Counts from one dispatch run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Rows successfully pushed onto the record queue.
    pub rows_sent: usize,
    /// Records the source rejected (logged, never queued).
    pub rows_skipped: usize,
    /// Reading stopped before the source was exhausted (cancel, abort, or no workers left).
    pub stopped_early: bool,
}

/// Consume `rows`, push each good row onto `record_tx`, skip bad ones.
/// A push blocks while the queue is full. Dropping `record_tx` on return closes the queue,
/// which is the only end-of-input signal workers get.
pub fn run_dispatch_loop<I>(
    record_tx: Sender<Row>,
    rows: I,
    shutdown: &ShutdownSignal,
) -> DispatchStats
where
    I: Iterator<Item = Result<Row, RowError>>,
{
    let mut stats = DispatchStats::default();
    let mut rows = rows;
    loop {
        // Check before pulling the next record.
        if shutdown.stop_dispatch() {
            stats.stopped_early = true;
            break;
        }
        let Some(item) = rows.next() else {
            break;
        };
        match item {
            Ok(row) => {
                if record_tx.send(row).is_err() {
                    warn!("Record queue closed by consumers; stopping dispatch");
                    stats.stopped_early = true;
                    break;
                }
                stats.rows_sent += 1;
            }
            Err(e) => {
                warn!("Skipping record: {}", e);
                stats.rows_skipped += 1;
            }
        }
    }
    drop(record_tx);
    if stats.stopped_early {
        warn!("Stopped reading the source early");
    }
    info!("Total records sent to processing: {}", stats.rows_sent);
    stats
}

/// Run [`run_dispatch_loop`] on its own thread.
pub fn spawn_dispatcher<I>(
    record_tx: Sender<Row>,
    rows: I,
    shutdown: Arc<ShutdownSignal>,
) -> JoinHandle<DispatchStats>
where
    I: Iterator<Item = Result<Row, RowError>> + Send + 'static,
{
    thread::spawn(move || run_dispatch_loop(record_tx, rows, &shutdown))
}
