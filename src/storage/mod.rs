//! Storage module for listings seen on previous runs
//!
//! This module handles all database operations for the watcher, including:
//! - SQLite database initialization and schema management
//! - Reading the set of already-known listing URLs
//! - Appending net new listings per search
//! - Run bookkeeping

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{SeenStore, StorageError, StorageResult};

use std::path::Path;

/// Opens or creates the seen-listings database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Represents a run in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_uuid: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub config_hash: String,
    pub status: RunStatus,
    pub net_new: u64,
}

/// Status of a watch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
