//! Open worker connections and check the target table before loading.

use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;
use std::collections::HashSet;
use std::time::Duration;

use crate::types::Header;
use crate::utils::config::WAL_PRAGMAS;
use crate::utils::credentials::ConnectParams;

use super::quote_ident;

/// Enable WAL so worker transactions do not block readers (idempotent).
fn apply_wal(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    Ok(())
}

/// Open the database, apply the SQLCipher key if any, enable WAL, and ping it.
/// Concurrent writers wait up to `busy_timeout` for the write lock.
pub fn open_db(params: &ConnectParams, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(&params.db_path)
        .with_context(|| format!("open database {}", params.db_path.display()))?;

    if let Some(key) = params.passphrase.as_deref() {
        conn.pragma_update(None, "key", key)
            .context("set SQLCipher key")?;
    }

    conn.busy_timeout(busy_timeout)
        .context("set busy timeout")?;
    conn.query_row("SELECT 1", [], |_| Ok(()))
        .context("ping database (wrong passphrase or not a database?)")?;
    apply_wal(&conn)?;
    Ok(conn)
}

/// Open `n` independent connections, one per worker. Any failure aborts setup.
pub fn open_pool(params: &ConnectParams, n: usize, busy_timeout: Duration) -> Result<Vec<Connection>> {
    let pool = (0..n)
        .map(|i| open_db(params, busy_timeout).with_context(|| format!("open connection {i}")))
        .collect::<Result<Vec<_>>>()?;
    debug!("Opened {} worker connections to {}", pool.len(), params.db_path.display());
    Ok(pool)
}

/// Column names of `table` in declaration order. Empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql).context("prepare table_info")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Fail unless `table` exists and has every header column. Does not create or alter anything.
pub fn check_table(conn: &Connection, table: &str, header: &Header) -> Result<()> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        anyhow::bail!("table {} does not exist", quote_ident(table));
    }
    let known: HashSet<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    let missing: Vec<&str> = header
        .columns()
        .iter()
        .filter(|c| !known.contains(&c.to_lowercase()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        anyhow::bail!(
            "table {} has no column(s) named {}",
            quote_ident(table),
            missing.join(", ")
        );
    }
    Ok(())
}

/// `SELECT COUNT(*)` on `table`.
pub fn row_count(conn: &Connection, table: &str) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    let n: i64 = conn
        .query_row(&sql, [], |row| row.get(0))
        .context("count rows")?;
    Ok(n.max(0) as usize)
}
