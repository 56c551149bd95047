//! Crawler module for listing searches
//!
//! This module contains the core crawling logic, including:
//! - Request pacing and concurrency limits
//! - HTTP fetching with proxy rotation on failure
//! - Per-site listing link extraction and pagination
//! - Bounded retry of empty result pages
//! - Run coordination across all configured searches

mod coordinator;
mod extractor;
mod fetcher;
mod limiter;
mod proxy;
mod retry;
mod search;
mod session;

#[cfg(test)]
mod testing;

pub use coordinator::{Coordinator, RunSummary};
pub use extractor::{
    qualify_link, AnchorPatternSite, EmbeddedJsonSite, LinkExtractor, PaginationCursor,
    SearchMode, DEFAULT_PAGE_PARAM,
};
pub use fetcher::{
    build_header_map, build_http_client, FetchedPage, HttpTransport, PageFetcher, PageOutcome,
    Transport,
};
pub use limiter::{RateLimitGuard, RateLimiter};
pub use proxy::ProxyRotator;
pub use retry::{Attempt, RetryPolicy};
pub use search::SearchCrawler;
pub use session::CrawlSession;
