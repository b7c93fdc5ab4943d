//! Engine module: database operations, CLI handling, reporting

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod report;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::{apply_cli_to_config, build_config, handle_run};
pub use db_ops::{
    BatchCommitter, CommitError, CopyIn, SqliteCommitter, check_table, insert_sql, open_db,
    open_pool, quote_ident, row_count, table_columns,
};
pub use report::print_report;
