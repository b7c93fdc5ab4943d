//! Final report output.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::pipeline::ImportReport;

/// Print `report` to stdout: human-readable lines, or one JSON object when `json`.
pub fn print_report(report: &ImportReport, json: bool) -> Result<()> {
    if json {
        let s = serde_json::to_string_pretty(report).context("serialize report")?;
        println!("{s}");
        return Ok(());
    }

    let headline = if report.aborted {
        "Data import aborted".red().bold()
    } else if report.has_errors() {
        "Data import completed with errors".yellow().bold()
    } else {
        "Data import completed".green().bold()
    };
    println!("{headline}");
    println!("  Execution time:     {:?}", report.elapsed);
    println!("  Records dispatched: {}", report.rows_dispatched);
    println!("  Records committed:  {}", report.rows_committed);
    println!(
        "  Batches:            {} committed, {} failed",
        report.batches_committed, report.batches_failed
    );
    if report.rows_failed > 0 {
        println!(
            "  Records lost:       {}",
            report.rows_failed.to_string().yellow()
        );
    }
    if report.rows_skipped > 0 {
        println!("  Records skipped:    {}", report.rows_skipped);
    }
    if report.stopped_early {
        println!("  Source:             {}", "not read to the end".yellow());
    }
    if report.rows_discarded > 0 {
        println!("  Records discarded:  {}", report.rows_discarded);
    }
    println!("  Memory delta:       {} KB", report.memory_delta_kb);

    if report.has_errors() {
        for f in &report.failures {
            println!("  {} {}", "-".yellow(), f);
        }
        let hidden = report.batches_failed.saturating_sub(report.failures.len());
        if hidden > 0 {
            println!("  ... and {} more failed batches", hidden);
        }
        println!(
            "{}",
            "Some records failed to import. Check the logs for details.".yellow()
        );
    }
    Ok(())
}
