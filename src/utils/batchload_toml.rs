//! Load `batchload.toml` (CLI only). Library callers build a [`LoadConfig`] directly.
//!
//! ```toml
//! [load]
//! source = "data.csv"
//! table = "bebelino"
//! workers = 8
//! batch_size = 500
//! failure_policy = "abort"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{FailurePolicy, InsertMode, LoadConfig};

#[derive(Debug, Default, Deserialize)]
pub struct BatchloadToml {
    #[serde(default)]
    load: LoadSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadSection {
    source: Option<PathBuf>,
    table: Option<String>,
    db: Option<PathBuf>,
    workers: Option<usize>,
    batch_size: Option<usize>,
    queue_capacity: Option<usize>,
    failure_policy: Option<FailurePolicy>,
    insert_mode: Option<InsertMode>,
    batch_timeout_secs: Option<u64>,
    busy_timeout_secs: Option<u64>,
    encrypt: Option<bool>,
    verbose: Option<bool>,
}

impl BatchloadToml {
    pub fn db_path(&self) -> Option<&Path> {
        self.load.db.as_deref()
    }

    pub fn encrypt(&self) -> Option<bool> {
        self.load.encrypt
    }

    pub fn verbose(&self) -> Option<bool> {
        self.load.verbose
    }
}

/// Parse a config file body. Errors are returned, not logged.
pub fn parse_batchload_toml(s: &str) -> Result<BatchloadToml, toml::de::Error> {
    toml::from_str(s)
}

/// Load the config file at `path` if present. Returns None if missing, unreadable, or invalid
/// (invalid files are logged and ignored).
pub fn load_batchload_toml(path: &Path) -> Option<BatchloadToml> {
    let s = std::fs::read_to_string(path).ok()?;
    parse_batchload_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite config field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $cfg:expr, $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $cfg.$field = v;
        }
    };
}

/// Apply file values to `cfg` (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_config(file: &BatchloadToml, cfg: &mut LoadConfig) {
    let s = &file.load;
    apply_file_opt!(s, cfg, source);
    apply_file_opt!(s, cfg, table);
    apply_file_opt!(s, cfg, workers);
    apply_file_opt!(s, cfg, batch_size);
    apply_file_opt!(s, cfg, failure_policy);
    apply_file_opt!(s, cfg, insert_mode);
    if s.queue_capacity.is_some() {
        cfg.queue_capacity = s.queue_capacity;
    }
    if let Some(secs) = s.batch_timeout_secs {
        cfg.batch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(secs) = s.busy_timeout_secs {
        cfg.busy_timeout = Duration::from_secs(secs);
    }
}
