//! Bulk-copy stream into one table: open inside a transaction, write rows, finish.

use rusqlite::{Connection, Statement, params_from_iter};

use crate::types::{Header, InsertMode, Row};
use crate::utils::config::SQLITE_MAX_VARIABLES;

use super::CommitError;

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `INSERT INTO "table" ("c1", ..) VALUES (?, ..), ..` with `rows` value tuples.
pub fn insert_sql(table: &str, header: &Header, rows: usize) -> String {
    let columns = header
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let tuple = format!("({})", vec!["?"; header.len()].join(", "));
    let values = vec![tuple.as_str(); rows].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        columns,
        values
    )
}

/// Streaming insert of rows into `(table, header columns)` on one connection.
///
/// In [`InsertMode::Copy`] rows are held until [`CopyIn::finish`], then written as multi-row
/// inserts sized to stay under the bound-parameter limit. In [`InsertMode::RowByRow`] each
/// [`CopyIn::write_row`] executes a single-row insert immediately.
///
/// Nothing is durable until the enclosing transaction commits.
pub struct CopyIn<'conn, 'rows> {
    conn: &'conn Connection,
    table: String,
    header: Header,
    row_stmt: Option<Statement<'conn>>,
    pending: Vec<&'rows Row>,
    written: usize,
}

impl<'conn, 'rows> CopyIn<'conn, 'rows> {
    pub fn open(
        conn: &'conn Connection,
        table: &str,
        header: &Header,
        mode: InsertMode,
    ) -> Result<Self, CommitError> {
        let row_stmt = match mode {
            InsertMode::RowByRow => Some(
                conn.prepare(&insert_sql(table, header, 1))
                    .map_err(CommitError::Prepare)?,
            ),
            InsertMode::Copy => None,
        };
        Ok(Self {
            conn,
            table: table.to_string(),
            header: header.clone(),
            row_stmt,
            pending: Vec::new(),
            written: 0,
        })
    }

    /// Rows per multi-row statement for this column count.
    fn rows_per_statement(&self) -> usize {
        (SQLITE_MAX_VARIABLES / self.header.len().max(1)).max(1)
    }

    pub fn write_row(&mut self, row: &'rows Row) -> Result<(), CommitError> {
        let index = self.written + self.pending.len();
        if row.len() != self.header.len() {
            return Err(CommitError::FieldCount {
                row: index,
                expected: self.header.len(),
                found: row.len(),
            });
        }
        match self.row_stmt.as_mut() {
            Some(stmt) => {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|source| CommitError::Insert { row: index, source })?;
                self.written += 1;
            }
            None => self.pending.push(row),
        }
        Ok(())
    }

    /// Write everything still buffered. Returns the number of rows written by this stream.
    pub fn finish(mut self) -> Result<usize, CommitError> {
        if self.pending.is_empty() {
            return Ok(self.written);
        }
        let per_stmt = self.rows_per_statement();
        let pending = std::mem::take(&mut self.pending);
        for chunk in pending.chunks(per_stmt) {
            let sql = insert_sql(&self.table, &self.header, chunk.len());
            let params = params_from_iter(chunk.iter().flat_map(|row| row.iter()));
            // Full chunks repeat across batches on this connection; the tail does not.
            let result = if chunk.len() == per_stmt {
                self.conn
                    .prepare_cached(&sql)
                    .and_then(|mut stmt| stmt.execute(params))
            } else {
                self.conn
                    .prepare(&sql)
                    .and_then(|mut stmt| stmt.execute(params))
            };
            result.map_err(CommitError::Flush)?;
            self.written += chunk.len();
        }
        Ok(self.written)
    }
}
