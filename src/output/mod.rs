//! Output module for operator-facing reports
//!
//! This module handles:
//! - Database statistics for the `stats` command
//! - Per-source run summaries after a harvest
//! - Summaries of the offline maintenance passes

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, DatabaseStatistics};
pub use summary::{
    failed_sources, no_source_progressed, print_analysis_summary, print_backfill_summary,
    print_run_summary,
};
