//! Listing-Watch: a polite real-estate listing monitor
//!
//! This crate crawls paginated search pages on listing sites under a shared
//! request budget, rotates egress proxies on failure, and reports listing
//! URLs that were not seen on previous runs.

pub mod config;
pub mod crawler;
pub mod notify;
pub mod proxies;
pub mod storage;

use thiserror::Error;

/// Main error type for Listing-Watch operations
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport failure for {url}: {cause}")]
    Transport { url: String, cause: String },

    #[error("Client error {status} for {url}")]
    ClientStatus { url: String, status: u16 },

    #[error("Server error {status} for {url}")]
    ServerStatus { url: String, status: u16 },

    #[error("Page parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("No listings found for {url} after {attempts} attempts")]
    ZeroListingsFound { url: String, attempts: u32 },

    #[error("Ran out of proxies after {used} of {total}")]
    ProxiesExhausted { used: usize, total: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Search cancelled")]
    Cancelled,
}

impl WatchError {
    /// Returns true for errors that must abort the whole run rather than
    /// just the current search URL.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProxiesExhausted { .. } | Self::Config(_) | Self::Cancelled
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

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Unsupported search mode: {0}")]
    UnsupportedMode(String),

    #[error("More than one match for '{pattern}' in {url}")]
    AmbiguousPagination { pattern: String, url: String },
}

/// Result type alias for Listing-Watch operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlSession, PaginationCursor, SearchMode};
