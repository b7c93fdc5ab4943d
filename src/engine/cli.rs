//! CLI command handler: layer config (defaults → file → flags), connect, load, report.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::arg_parser::Cli;
use crate::engine::report::print_report;
use crate::pipeline::ShutdownSignal;
use crate::types::{FailurePolicy, InsertMode, LoadConfig};
use crate::utils::config::PackagePaths;
use crate::utils::{
    BatchloadToml, apply_file_to_config, collect_connect_params, load_batchload_toml,
    setup_logging,
};

/// Apply CLI flags over `cfg` (flags win over the config file).
pub fn apply_cli_to_config(cli: &Cli, cfg: &mut LoadConfig) {
    if let Some(ref f) = cli.file {
        cfg.source = f.clone();
    }
    if let Some(ref t) = cli.table {
        cfg.table = t.clone();
    }
    if let Some(n) = cli.workers {
        cfg.workers = n;
    }
    if let Some(n) = cli.batch_size {
        cfg.batch_size = n;
    }
    if cli.queue_capacity.is_some() {
        cfg.queue_capacity = cli.queue_capacity;
    }
    if cli.abort_on_error {
        cfg.failure_policy = FailurePolicy::Abort;
    }
    if cli.row_inserts {
        cfg.insert_mode = InsertMode::RowByRow;
    }
    if let Some(secs) = cli.batch_timeout {
        cfg.batch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
}

fn config_file_path(cli: &Cli, dir: &Path) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| dir.join(PackagePaths::get().config_filename()))
}

/// Build the load config from defaults, the config file (if any), then flags.
pub fn build_config(cli: &Cli, file: Option<&BatchloadToml>) -> LoadConfig {
    let mut cfg = LoadConfig::default();
    if let Some(file) = file {
        apply_file_to_config(file, &mut cfg);
    }
    apply_cli_to_config(cli, &mut cfg);
    cfg
}

/// Run one load from the command line. Failed batches are a warning; setup errors and an
/// aborted run are errors.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let dir = std::env::current_dir().context("resolve working directory")?;
    let config_path = config_file_path(cli, &dir);
    if cli.config.is_some() && !config_path.is_file() {
        anyhow::bail!("config file {} not found", config_path.display());
    }
    let file = load_batchload_toml(&config_path);
    setup_logging(cli.verbose || file.as_ref().and_then(|f| f.verbose()).unwrap_or(false));
    if file.is_some() {
        debug!("Using config file {}", config_path.display());
    }

    let cfg = build_config(cli, file.as_ref());
    cfg.validate()?;
    if cfg.source.as_os_str().is_empty() {
        anyhow::bail!("no source file given");
    }
    debug!("{} CONFIG: {:#?}", PackagePaths::get().pkg_name().to_uppercase(), cfg);

    let db_path = cli
        .db
        .as_deref()
        .or_else(|| file.as_ref().and_then(|f| f.db_path()));
    let encrypt = cli.encrypt || file.as_ref().and_then(|f| f.encrypt()).unwrap_or(false);
    let params = collect_connect_params(db_path, encrypt, &dir)?;

    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_handler = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_handler.request_cancel();
    })
    .context("set Ctrl+C handler")?;

    let report = crate::load_file_with_signal(&cfg, &params, shutdown)?;
    print_report(&report, cli.json)?;

    if report.aborted {
        anyhow::bail!(
            "load aborted after a failed batch; {} rows committed",
            report.rows_committed
        );
    }
    if report.cancelled {
        warn!("Load cancelled by user; rows already queued were committed");
    }
    Ok(())
}
