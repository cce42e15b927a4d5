//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::keywords::{Keyword, KeywordRule};
use crate::storage::{
    Advertisement, ExportRow, FieldUpdate, IdRange, NewAdvertisement, PendingAdvertisement,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Keyword pattern '{search}' does not compile: {reason}")]
    InvalidPattern { search: String, reason: String },

    #[error("Advertisement not found: {0}")]
    AdvertisementNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Each harvest worker owns its own implementation instance; the backend is
/// responsible for enforcing URL uniqueness even when several instances
/// write to the same database.
pub trait Storage {
    // ===== Advertisements =====

    /// Returns true if `url` was already harvested successfully (status 200
    /// and a non-empty body)
    fn exists(&self, url: &str) -> StorageResult<bool>;

    /// Inserts an advertisement, or overwrites the row already stored for
    /// its URL, and returns the row id
    fn insert_advertisement(&mut self, ad: &NewAdvertisement) -> StorageResult<i64>;

    /// Inserts an advertisement together with its tags
    ///
    /// Either both the row and its tag set are written, or neither is.
    fn store_advertisement(
        &mut self,
        ad: &NewAdvertisement,
        keyword_ids: &[i64],
    ) -> StorageResult<i64>;

    /// Writes a batch of advertisements in one transaction
    ///
    /// A failure on one advertisement rolls back only that advertisement; the
    /// outer error is reserved for failures of the transaction itself.
    fn store_batch(
        &mut self,
        batch: &[PendingAdvertisement],
    ) -> StorageResult<Vec<StorageResult<i64>>> {
        self.begin_batch()?;
        let results = batch
            .iter()
            .map(|pending| self.store_advertisement(&pending.record, &pending.keyword_ids))
            .collect();
        self.commit_batch()?;
        Ok(results)
    }

    /// Gets an advertisement by id
    fn get_advertisement(&self, id: i64) -> StorageResult<Option<Advertisement>>;

    /// Lists advertisement ids in ascending order
    ///
    /// With `incomplete_only`, only advertisements missing at least one of
    /// title, company, location or description are listed.
    fn advertisement_ids(&self, range: IdRange, incomplete_only: bool) -> StorageResult<Vec<i64>>;

    /// Overwrites the fields present in `update`
    fn update_fields(&mut self, id: i64, update: &FieldUpdate) -> StorageResult<()>;

    // ===== Tags =====

    /// Replaces the tag set of an advertisement
    ///
    /// The previous associations are removed before the new ones are
    /// inserted, in one atomic step.
    fn replace_tags(&mut self, advertisement_id: i64, keyword_ids: &[i64]) -> StorageResult<()>;

    /// Gets the labels of the keywords tagged on an advertisement
    fn tag_titles(&self, advertisement_id: i64) -> StorageResult<Vec<String>>;

    // ===== Keywords =====

    /// Inserts a keyword unless one with the same pattern exists and returns
    /// its id
    ///
    /// Patterns that do not compile are rejected with
    /// [`StorageError::InvalidPattern`].
    fn upsert_keyword(&mut self, rule: &KeywordRule) -> StorageResult<i64>;

    /// Loads every stored keyword ordered by id
    fn load_keywords(&self) -> StorageResult<Vec<Keyword>>;

    /// Removes every keyword and every tag
    fn clear_keywords(&mut self) -> StorageResult<()>;

    // ===== Transactions =====

    /// Opens a batch transaction unless one is already open
    fn begin_batch(&mut self) -> StorageResult<()>;

    /// Commits the open batch transaction, if any
    fn commit_batch(&mut self) -> StorageResult<()>;

    /// Rolls back the open batch transaction, if any
    fn rollback_batch(&mut self) -> StorageResult<()>;

    // ===== Export =====

    /// Reads tagged advertisements in `range` with their tag labels
    fn export_rows(&self, range: IdRange) -> StorageResult<Vec<ExportRow>>;

    /// Records the file an advertisement was exported to
    fn set_export_filename(&mut self, id: i64, filename: &str) -> StorageResult<()>;

    // ===== Statistics =====

    fn count_advertisements(&self) -> StorageResult<u64>;

    fn count_keywords(&self) -> StorageResult<u64>;

    fn count_tags(&self) -> StorageResult<u64>;

    /// Counts advertisements per engine, ordered by engine name
    fn count_by_source_type(&self) -> StorageResult<Vec<(String, u64)>>;
}
