//! Connection parameters: database path and optional SQLCipher passphrase.
//! Each value comes from the caller, then env / `.env`, then an interactive prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::{info, warn};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Everything needed to open a worker connection.
#[derive(Clone, Default)]
pub struct ConnectParams {
    pub db_path: PathBuf,
    /// SQLCipher key. None for a plain database.
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("db_path", &self.db_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Non-empty, trimmed value of `key` from the process env, loading `dir/.env` first if present.
fn try_env_then_dotenv(key: &str, dir: &Path) -> Option<String> {
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
    }
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn prompt_label() -> colored::ColoredString {
    format!("[{}]", PackagePaths::get().pkg_name()).cyan().bold()
}

/// Read one trimmed line from stdin after printing `prompt`.
fn prompt_line(prompt: &str) -> Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{} {}", prompt_label(), prompt).context("write prompt")?;
    stderr.flush().context("flush prompt")?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read from stdin")?;
    Ok(line.trim().to_string())
}

/// Database path: `given` → env (`BATCHLOAD_DB`) → `.env` in `dir` → prompt.
pub fn get_db_path(given: Option<&Path>, dir: &Path) -> Result<PathBuf> {
    if let Some(p) = given {
        return Ok(p.to_path_buf());
    }
    if let Some(s) = try_env_then_dotenv(PackagePaths::get().db_env_key(), dir) {
        info!("Database path found in environment");
        return Ok(PathBuf::from(s));
    }
    let line = prompt_line("Enter database path: ")?;
    if line.is_empty() {
        anyhow::bail!("no database path given");
    }
    Ok(PathBuf::from(line))
}

/// Passphrase: env (`BATCHLOAD_DB_KEY`) → `.env` in `dir` → masked prompt.
pub fn get_passphrase(dir: &Path) -> Result<String> {
    info!("Encryption mode: database will be opened with a SQLCipher key");
    if let Some(s) = try_env_then_dotenv(PackagePaths::get().db_key_env_key(), dir) {
        info!("Passphrase found in environment");
        return Ok(s);
    }
    let pass = rpassword::prompt_password(format!("{} Enter passphrase: ", prompt_label()))
        .context("read passphrase")?;
    let pass = pass.trim().to_string();
    if pass.is_empty() {
        warn!("Empty passphrase; the database will be opened without a key");
    }
    Ok(pass)
}

/// Collect connection parameters, prompting for whatever the caller and environment did not supply.
pub fn collect_connect_params(
    db_path: Option<&Path>,
    encrypt: bool,
    dir: &Path,
) -> Result<ConnectParams> {
    let db_path = get_db_path(db_path, dir)?;
    let passphrase = if encrypt {
        Some(get_passphrase(dir)?).filter(|p| !p.is_empty())
    } else {
        None
    };
    Ok(ConnectParams {
        db_path,
        passphrase,
    })
}
