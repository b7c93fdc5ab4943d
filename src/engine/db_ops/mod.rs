//! Database operations: open/ping/pre-flight, bulk-copy stream, per-batch commit.

mod committer;
mod connection;
mod copy_in;

pub use committer::{BatchCommitter, CommitError, SqliteCommitter};
pub use connection::{check_table, open_db, open_pool, row_count, table_columns};
pub use copy_in::{CopyIn, insert_sql, quote_ident};
