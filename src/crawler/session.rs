//! Listing URLs discovered during a crawl session

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Deduplicated set of listing URLs, grown by every search against one gateway
///
/// Uniqueness is by exact string match. The set only ever grows until the
/// owner explicitly calls [`CrawlSession::reset`]. Interior locking makes it
/// safe to share between concurrent searches.
#[derive(Debug, Default)]
pub struct CrawlSession {
    urls: Mutex<HashSet<String>>,
}

impl CrawlSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave a half-inserted string
        self.urls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a URL, returning true if it was not already present
    pub fn insert(&self, url: &str) -> bool {
        let mut urls = self.lock();
        if urls.contains(url) {
            return false;
        }
        urls.insert(url.to_string())
    }

    /// Adds every URL, returning how many were new
    pub fn extend<'a, I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut set = self.lock();
        urls.into_iter()
            .filter(|url| set.insert((*url).clone()))
            .count()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a sorted copy of the current set
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.lock().iter().cloned().collect()
    }

    /// Starts a new session, forgetting every URL seen so far
    pub fn reset(&self) {
        self.lock().clear();
    }
}
