//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the seen-listings
//! database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Listings already reported, one row per listing URL
CREATE TABLE IF NOT EXISTS seen_ads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ad_url TEXT NOT NULL UNIQUE,
    search_url TEXT NOT NULL,
    run_uuid TEXT NOT NULL,
    seen_on INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_seen_ads_run ON seen_ads(run_uuid);

-- Track watch runs
CREATE TABLE IF NOT EXISTS runs (
    run_uuid TEXT PRIMARY KEY,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    net_new INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
