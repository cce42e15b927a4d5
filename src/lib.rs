//! Job-Harvester: a polite job-advertisement harvester
//!
//! This crate walks the sitemaps of configured job portals, fetches every
//! advertisement it has not stored yet, extracts structured fields from the
//! markup, tags each advertisement with matching keyword rules and persists
//! the result in SQLite. Every source runs as its own worker with its own
//! politeness state.

pub mod config;
pub mod crawler;
pub mod engine;
pub mod extract;
pub mod keywords;
pub mod maintenance;
pub mod output;
pub mod robots;
pub mod sitemap;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source '{source_name}' names unregistered engine '{engine}'")]
    UnknownEngine { source_name: String, engine: String },

    #[error("No usable robots.txt for {url}: {source}")]
    Politeness {
        url: String,
        source: robots::RobotsError,
    },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status} (retried: {retried})")]
    UnexpectedStatus {
        url: String,
        status: u16,
        retried: bool,
    },

    #[error("{0} returned an empty body")]
    EmptyBody(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker for source '{0}' terminated abnormally")]
    WorkerAborted(String),
}

impl HarvestError {
    /// Returns true for configuration-class errors that end a whole source
    /// rather than a single advertisement.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownEngine { .. }
                | Self::Politeness { .. }
                | Self::WorkerAborted(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{HarvestOrchestrator, HarvestSummary, SourcePool, SourceReport};
pub use engine::EngineRegistry;
pub use keywords::{KeywordMatcher, MatchScope};
pub use storage::{SqliteStorage, Storage};
