//! Storage traits and error types
//!
//! This module defines the trait interface for seen-listing stores and
//! associated error types.

use crate::storage::{RunRecord, RunStatus};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Record of listings reported on earlier runs
///
/// This is the cross-run half of deduplication; the crawl session only
/// deduplicates within a run.
pub trait SeenStore {
    /// Returns every listing URL stored so far
    fn known_urls(&self) -> StorageResult<HashSet<String>>;

    /// Appends listings found by `search_url` during `run_uuid`
    ///
    /// `seen_on` is epoch milliseconds. URLs already stored are ignored.
    /// Returns how many rows were added.
    fn append(
        &mut self,
        urls: &BTreeSet<String>,
        search_url: &str,
        run_uuid: &str,
        seen_on: i64,
    ) -> StorageResult<usize>;

    /// Records the start of a run
    fn start_run(&mut self, run_uuid: &str, config_hash: &str) -> StorageResult<()>;

    /// Marks a run finished with its outcome
    fn finish_run(&mut self, run_uuid: &str, status: RunStatus, net_new: u64)
        -> StorageResult<()>;

    /// Gets a run by id
    fn get_run(&self, run_uuid: &str) -> StorageResult<RunRecord>;
}
