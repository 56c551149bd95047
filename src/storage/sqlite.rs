//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the SeenStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SeenStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Number of stored listings
    pub fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_ads", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl SeenStore for SqliteStore {
    fn known_urls(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT ad_url FROM seen_ads")?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(urls)
    }

    fn append(
        &mut self,
        urls: &BTreeSet<String>,
        search_url: &str,
        run_uuid: &str,
        seen_on: i64,
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO seen_ads (ad_url, search_url, run_uuid, seen_on)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for url in urls {
                added += stmt.execute(params![url, search_url, run_uuid, seen_on])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn start_run(&mut self, run_uuid: &str, config_hash: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO runs (run_uuid, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                run_uuid,
                Utc::now().timestamp_millis(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn finish_run(
        &mut self,
        run_uuid: &str,
        status: RunStatus,
        net_new: u64,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, net_new = ?3 WHERE run_uuid = ?4",
            params![
                Utc::now().timestamp_millis(),
                status.to_db_string(),
                net_new as i64,
                run_uuid
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_uuid.to_string()));
        }
        Ok(())
    }

    fn get_run(&self, run_uuid: &str) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT run_uuid, started_at, finished_at, config_hash, status, net_new
             FROM runs WHERE run_uuid = ?1",
        )?;

        stmt.query_row(params![run_uuid], |row| {
            Ok(RunRecord {
                run_uuid: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                config_hash: row.get(3)?,
                status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                    .unwrap_or(RunStatus::Running),
                net_new: row.get::<_, i64>(5)? as u64,
            })
        })
        .map_err(|_| StorageError::RunNotFound(run_uuid.to_string()))
    }
}
