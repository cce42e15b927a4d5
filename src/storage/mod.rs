//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Advertisement persistence and the idempotency check
//! - Keyword rules and tag replacement
//! - Read-only export queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

/// An advertisement about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdvertisement {
    pub url: String,
    pub http_status: u16,
    pub html_body: String,
    /// Name of the engine whose extractor produced the fields
    pub ad_type: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// An advertisement together with the keywords it matched, waiting for the
/// next batch commit
#[derive(Debug, Clone)]
pub struct PendingAdvertisement {
    pub record: NewAdvertisement,
    pub keyword_ids: Vec<i64>,
}

/// Represents an advertisement in the database
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub id: i64,
    pub url: String,
    pub http_status: u16,
    pub html_body: String,
    pub ad_type: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub created_at: Option<String>,
}

impl Advertisement {
    /// Returns true if any extracted field is still missing
    pub fn is_incomplete(&self) -> bool {
        self.title.is_none()
            || self.company.is_none()
            || self.location.is_none()
            || self.description.is_none()
    }
}

/// Fields to overwrite on a stored advertisement; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl FieldUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.company.is_none()
            && self.location.is_none()
            && self.description.is_none()
    }
}

/// A tagged advertisement as read by exporters
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub id: i64,
    pub url: String,
    pub ad_type: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub created_at: Option<String>,
    pub tags: Vec<String>,
}

/// Inclusive advertisement id bounds; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IdRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }
}
