//! Test doubles for the crawler

use crate::crawler::fetcher::{PageOutcome, Transport};
use crate::WatchError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Transport replaying canned outcomes
///
/// Lookup order: a fixed page registered for the exact URL, then the next
/// scripted outcome, then the fallback.
pub struct ScriptedTransport {
    routes: HashMap<String, PageOutcome>,
    script: Mutex<VecDeque<PageOutcome>>,
    fallback: PageOutcome,
    requests: AtomicUsize,
    urls: Mutex<Vec<String>>,
    proxies: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<PageOutcome>) -> Self {
        Self {
            routes: HashMap::new(),
            script: Mutex::new(script.into()),
            fallback: PageOutcome::TransportFailure("script exhausted".to_string()),
            requests: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            proxies: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(outcome: PageOutcome) -> Self {
        Self::new(Vec::new()).with_fallback(outcome)
    }

    /// Serves the same HTML for each URL on every request
    pub fn pages(pages: Vec<(&str, &str)>) -> Self {
        let mut transport = Self::new(Vec::new()).with_fallback(PageOutcome::ClientError {
            status: 404,
            body: "not found".to_string(),
        });
        for (url, html) in pages {
            transport
                .routes
                .insert(url.to_string(), PageOutcome::Ok(html.as_bytes().to_vec()));
        }
        transport
    }

    pub fn with_fallback(mut self, outcome: PageOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn proxies(&self) -> Vec<Option<String>> {
        self.proxies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> PageOutcome {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        if let Some(page) = self.routes.get(url) {
            return page.clone();
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn set_proxy(&self, proxy: Option<&str>) -> Result<(), WatchError> {
        self.proxies
            .lock()
            .unwrap()
            .push(proxy.map(str::to_string));
        Ok(())
    }
}
