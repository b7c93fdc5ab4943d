//! Application configuration constants.
//! Defaults and tuning in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / names (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    db_env_key: String,
    db_key_env_key: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            let upper = pkg.to_uppercase();
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                db_env_key: format!("{upper}_DB"),
                db_key_env_key: format!("{upper}_DB_KEY"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file looked up in the working directory when `--config` is not given.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Env var holding the database path.
    pub fn db_env_key(&self) -> &str {
        &self.db_env_key
    }

    /// Env var holding the SQLCipher passphrase.
    pub fn db_key_env_key(&self) -> &str {
        &self.db_key_env_key
    }
}

// ---- Workers / batching ----

/// Concurrent workers when not configured.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Rows per transaction when not configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Record queue slots per worker. Keeps the dispatcher a little ahead without buffering the file.
pub const RECORD_QUEUE_SLOTS_PER_WORKER: usize = 2;

// ---- Database ----

/// Lock wait before a statement gives up with SQLITE_BUSY.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite VM instructions between deadline checks while a batch statement runs.
pub const DEADLINE_CHECK_OPS: std::ffi::c_int = 1_000;

/// Max bound parameters per statement (SQLITE_MAX_VARIABLE_NUMBER in the bundled build).
pub const SQLITE_MAX_VARIABLES: usize = 32_766;

/// WAL tuning pragmas. Use after PRAGMA journal_mode = WAL.
pub const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

// ---- Report ----

/// Failure messages kept verbatim in the report; the rest are only counted.
pub const MAX_REPORTED_FAILURES: usize = 50;
