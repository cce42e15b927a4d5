//! End-of-run reports printed to the operator

use crate::crawler::SourceReport;
use crate::maintenance::{AnalysisSummary, BackfillSummary};

/// Prints one block per source, in configuration order
pub fn print_run_summary(reports: &[SourceReport]) {
    println!("=== Harvest Summary ===\n");

    for report in reports {
        match &report.result {
            Ok(summary) => {
                println!("{}:", report.source);
                println!("  Processed: {}", summary.processed);
                println!("  Stored: {}", summary.stored);
                println!("  Already harvested: {}", summary.skipped_existing);
                println!("  Disallowed: {}", summary.disallowed);
                println!("  Gone: {}", summary.gone);
                println!("  Errors: {}", summary.errors);
                println!(
                    "  Elapsed: {:.1}s ({:.1} items/min)",
                    summary.elapsed.as_secs_f64(),
                    summary.items_per_minute()
                );
            }
            Err(e) => {
                println!("{}:", report.source);
                println!("  FAILED: {}", e);
            }
        }
        println!();
    }

    let failed = failed_sources(reports);
    println!(
        "Sources: {} succeeded, {} failed",
        reports.len() - failed,
        failed
    );
}

/// Number of sources whose worker ended with an error
pub fn failed_sources(reports: &[SourceReport]) -> usize {
    reports.iter().filter(|r| !r.is_success()).count()
}

/// True when no source made progress
///
/// A source made progress when its worker finished, even if every
/// candidate was already harvested.
pub fn no_source_progressed(reports: &[SourceReport]) -> bool {
    !reports.is_empty() && failed_sources(reports) == reports.len()
}

pub fn print_analysis_summary(summary: &AnalysisSummary) {
    println!("=== Analysis Summary ===\n");
    println!("  Analyzed: {}", summary.analyzed);
    println!("  Tagged: {}", summary.tagged);
    println!("  Tags written: {}", summary.tags);
}

pub fn print_backfill_summary(summary: &BackfillSummary) {
    println!("=== Update Summary ===\n");
    println!("  Examined: {}", summary.examined);
    println!("  Updated: {}", summary.updated);
    if summary.unknown_engine > 0 {
        println!("  Unknown engine: {}", summary.unknown_engine);
    }
}
