//! Robots.txt handling module
//!
//! This module fetches, parses and caches the robots.txt of a source and
//! turns it into the politeness policy a worker obeys.

mod gate;
mod parser;

pub use gate::PolitenessGate;
pub use parser::{ParsedRobots, MAX_CRAWL_DELAY_SECS};

use thiserror::Error;

/// Errors that leave a source without a usable politeness policy
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed Crawl-delay '{value}' on line {line}")]
    MalformedDelay { line: usize, value: String },
}
