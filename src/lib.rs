//! Batchload: parallel bulk loading of delimited text into a database table.
//!
//! One dispatcher reads the source in order into a bounded record queue; N workers batch rows
//! and commit each batch in its own transaction; an aggregator sums what the workers report.
//! A batch is either fully visible or not at all; a failed batch does not stop the run unless
//! [`FailurePolicy::Abort`] is set.

pub mod engine;
pub mod pipeline;
pub mod source;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use pipeline::{ImportReport, ShutdownSignal};
pub use types::*;

use anyhow::Context;
use log::debug;
use std::sync::Arc;

use engine::db_ops::{SqliteCommitter, check_table, open_pool};
use source::CsvSource;
use utils::credentials::ConnectParams;

/// Result alias used by public batchload API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Load `cfg.source` into `cfg.table` of the database described by `params`.
///
/// Setup failures (bad config, no connection, unreadable source, missing table or columns)
/// return `Err` before any row is read. After that, bad rows and failed batches only show up
/// in the returned [`ImportReport`].
pub fn load_file(cfg: &LoadConfig, params: &ConnectParams) -> Result<ImportReport> {
    load_file_with_signal(cfg, params, Arc::new(ShutdownSignal::new()))
}

/// [`load_file`] with a caller-owned [`ShutdownSignal`] (e.g. raised from a Ctrl+C handler).
pub fn load_file_with_signal(
    cfg: &LoadConfig,
    params: &ConnectParams,
    shutdown: Arc<ShutdownSignal>,
) -> Result<ImportReport> {
    cfg.validate()?;
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        cfg
    );

    let pool = open_pool(params, cfg.workers, cfg.busy_timeout)?;
    let source = CsvSource::open(&cfg.source)?;
    let header = source.header().clone();
    if let Some(conn) = pool.first() {
        check_table(conn, &cfg.table, &header)
            .with_context(|| format!("check target table for {}", cfg.source.display()))?;
    }

    let committers: Vec<SqliteCommitter> = pool
        .into_iter()
        .map(|conn| {
            SqliteCommitter::new(conn, cfg.insert_mode, cfg.batch_timeout)
                .with_busy_timeout(cfg.busy_timeout)
        })
        .collect();
    pipeline::run_pipeline(source, header, committers, cfg, shutdown)
}
