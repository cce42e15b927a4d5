//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::keywords::{Keyword, KeywordMatcher, KeywordRule};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Advertisement, ExportRow, FieldUpdate, IdRange, NewAdvertisement};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// SQLite storage backend
///
/// One instance wraps one connection. Workers that run concurrently each
/// open their own instance on the same database file.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `busy_timeout` - How long to wait for a lock held by another connection
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path, busy_timeout: Duration) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn upsert_advertisement(conn: &Connection, ad: &NewAdvertisement) -> rusqlite::Result<i64> {
    conn.query_row(
        "INSERT INTO advertisements
             (url, http_status, html_body, ad_type, title, company, location, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(url) DO UPDATE SET
             http_status = excluded.http_status,
             html_body = excluded.html_body,
             ad_type = excluded.ad_type,
             title = excluded.title,
             company = excluded.company,
             location = excluded.location,
             description = excluded.description
         RETURNING id",
        params![
            ad.url,
            ad.http_status,
            ad.html_body,
            ad.ad_type,
            ad.title,
            ad.company,
            ad.location,
            ad.description
        ],
        |row| row.get(0),
    )
}

fn write_tags(conn: &Connection, advertisement_id: i64, keyword_ids: &[i64]) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM keyword_advertisement WHERE advertisement_id = ?1",
        params![advertisement_id],
    )?;

    let unique: BTreeSet<i64> = keyword_ids.iter().copied().collect();
    let mut stmt = conn.prepare(
        "INSERT INTO keyword_advertisement (keyword_id, advertisement_id) VALUES (?1, ?2)",
    )?;
    for keyword_id in unique {
        stmt.execute(params![keyword_id, advertisement_id])?;
    }
    Ok(())
}

fn advertisement_from_row(row: &Row<'_>) -> rusqlite::Result<Advertisement> {
    Ok(Advertisement {
        id: row.get(0)?,
        url: row.get(1)?,
        http_status: row.get(2)?,
        html_body: row.get(3)?,
        ad_type: row.get(4)?,
        title: row.get(5)?,
        company: row.get(6)?,
        location: row.get(7)?,
        description: row.get(8)?,
        filename: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Advertisements =====

    fn exists(&self, url: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM advertisements
                 WHERE url = ?1 AND http_status = 200 AND length(html_body) > 0
             )",
            params![url],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_advertisement(&mut self, ad: &NewAdvertisement) -> StorageResult<i64> {
        Ok(upsert_advertisement(&self.conn, ad)?)
    }

    fn store_advertisement(
        &mut self,
        ad: &NewAdvertisement,
        keyword_ids: &[i64],
    ) -> StorageResult<i64> {
        // Dropping the savepoint without commit rolls it back
        let sp = self.conn.savepoint()?;
        let id = upsert_advertisement(&sp, ad)?;
        write_tags(&sp, id, keyword_ids)?;
        sp.commit()?;
        Ok(id)
    }

    fn get_advertisement(&self, id: i64) -> StorageResult<Option<Advertisement>> {
        let ad = self
            .conn
            .query_row(
                "SELECT id, url, http_status, html_body, ad_type, title, company, location,
                        description, filename, created_at
                 FROM advertisements WHERE id = ?1",
                params![id],
                advertisement_from_row,
            )
            .optional()?;
        Ok(ad)
    }

    fn advertisement_ids(&self, range: IdRange, incomplete_only: bool) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM advertisements
             WHERE (?1 IS NULL OR id >= ?1)
               AND (?2 IS NULL OR id <= ?2)
               AND (?3 = 0 OR title IS NULL OR company IS NULL
                    OR location IS NULL OR description IS NULL)
             ORDER BY id",
        )?;

        let ids = stmt
            .query_map(params![range.min, range.max, incomplete_only], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn update_fields(&mut self, id: i64, update: &FieldUpdate) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE advertisements SET
                 title = COALESCE(?1, title),
                 company = COALESCE(?2, company),
                 location = COALESCE(?3, location),
                 description = COALESCE(?4, description)
             WHERE id = ?5",
            params![
                update.title,
                update.company,
                update.location,
                update.description,
                id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::AdvertisementNotFound(id));
        }
        Ok(())
    }

    // ===== Tags =====

    fn replace_tags(&mut self, advertisement_id: i64, keyword_ids: &[i64]) -> StorageResult<()> {
        let sp = self.conn.savepoint()?;
        write_tags(&sp, advertisement_id, keyword_ids)?;
        sp.commit()?;
        Ok(())
    }

    fn tag_titles(&self, advertisement_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(k.title, k.search)
             FROM keywords k
             JOIN keyword_advertisement ka ON ka.keyword_id = k.id
             WHERE ka.advertisement_id = ?1
             ORDER BY k.id",
        )?;

        let titles = stmt
            .query_map(params![advertisement_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    // ===== Keywords =====

    fn upsert_keyword(&mut self, rule: &KeywordRule) -> StorageResult<i64> {
        if let Err(e) = KeywordMatcher::compile_pattern(&rule.search, rule.case_sensitive) {
            return Err(StorageError::InvalidPattern {
                search: rule.search.clone(),
                reason: e.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO keywords (title, search, case_sensitive) VALUES (?1, ?2, ?3)
             ON CONFLICT(search) DO NOTHING",
            params![rule.label(), rule.search, rule.case_sensitive],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM keywords WHERE search = ?1",
            params![rule.search],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn load_keywords(&self) -> StorageResult<Vec<Keyword>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, search, case_sensitive FROM keywords ORDER BY id")?;

        let keywords = stmt
            .query_map([], |row| {
                Ok(Keyword {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    search: row.get(2)?,
                    case_sensitive: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    fn clear_keywords(&mut self) -> StorageResult<()> {
        let sp = self.conn.savepoint()?;
        sp.execute("DELETE FROM keyword_advertisement", [])?;
        sp.execute("DELETE FROM keywords", [])?;
        sp.commit()?;
        Ok(())
    }

    // ===== Transactions =====

    fn begin_batch(&mut self) -> StorageResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        Ok(())
    }

    fn commit_batch(&mut self) -> StorageResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback_batch(&mut self) -> StorageResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // ===== Export =====

    fn export_rows(&self, range: IdRange) -> StorageResult<Vec<ExportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.url, a.ad_type, a.title, a.company, a.location, a.description,
                    a.filename, a.created_at
             FROM advertisements a
             WHERE EXISTS (
                     SELECT 1 FROM keyword_advertisement ka WHERE ka.advertisement_id = a.id
                 )
               AND (?1 IS NULL OR a.id >= ?1)
               AND (?2 IS NULL OR a.id <= ?2)
             ORDER BY a.id",
        )?;

        let mut rows = stmt
            .query_map(params![range.min, range.max], |row| {
                Ok(ExportRow {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    ad_type: row.get(2)?,
                    title: row.get(3)?,
                    company: row.get(4)?,
                    location: row.get(5)?,
                    description: row.get(6)?,
                    filename: row.get(7)?,
                    created_at: row.get(8)?,
                    tags: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for row in &mut rows {
            row.tags = self.tag_titles(row.id)?;
        }
        Ok(rows)
    }

    fn set_export_filename(&mut self, id: i64, filename: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE advertisements SET filename = ?1 WHERE id = ?2",
            params![filename, id],
        )?;

        if changed == 0 {
            return Err(StorageError::AdvertisementNotFound(id));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_advertisements(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM advertisements", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_keywords(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM keywords", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_tags(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM keyword_advertisement", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn count_by_source_type(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT ad_type, COUNT(*) FROM advertisements GROUP BY ad_type ORDER BY ad_type",
        )?;

        let counts = stmt
            .query_map([], |row| {
                let ad_type: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((ad_type, count as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}
