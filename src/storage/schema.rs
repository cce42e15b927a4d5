//! Database schema definitions
//!
//! This module contains the SQL schema for advertisements, keywords and the
//! tags linking them.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested advertisements, one row per URL
CREATE TABLE IF NOT EXISTS advertisements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    description TEXT,
    company TEXT,
    location TEXT,
    url TEXT NOT NULL UNIQUE,
    html_body TEXT NOT NULL,
    http_status INTEGER NOT NULL,
    ad_type TEXT NOT NULL,
    filename TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_advertisements_url ON advertisements(url);
CREATE INDEX IF NOT EXISTS idx_advertisements_ad_type ON advertisements(ad_type);

-- Keyword rules
CREATE TABLE IF NOT EXISTS keywords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    search TEXT NOT NULL UNIQUE,
    case_sensitive INTEGER NOT NULL DEFAULT 0
);

-- Tags: which keywords matched which advertisement
CREATE TABLE IF NOT EXISTS keyword_advertisement (
    keyword_id INTEGER NOT NULL REFERENCES keywords(id),
    advertisement_id INTEGER NOT NULL REFERENCES advertisements(id),
    PRIMARY KEY (keyword_id, advertisement_id)
);

CREATE INDEX IF NOT EXISTS idx_keyword_advertisement_ad
    ON keyword_advertisement(advertisement_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
