//! Harvest workers
//!
//! This module contains the per-source harvest machinery:
//! - HTTP fetching with session priming and a single transient retry
//! - Request pacing
//! - The candidate pipeline of one source
//! - Concurrent workers, one per source

mod fetcher;
mod limiter;
mod orchestrator;
mod pool;

pub use fetcher::{build_http_client, default_headers, FetchOutcome, FetchedPage, Fetcher};
pub use limiter::RateLimiter;
pub use orchestrator::{HarvestOrchestrator, HarvestSummary};
pub use pool::{SourcePool, SourceReport};
