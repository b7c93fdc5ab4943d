//! Batchload CLI: load a delimited text file into a table with concurrent batching workers.

use anyhow::Result;
use batchload::engine::arg_parser::Cli;
use batchload::engine::handle_run;
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
