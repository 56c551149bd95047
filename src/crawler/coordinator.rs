//! Run coordinator - batch orchestration over all configured searches
//!
//! This module contains the main watch loop, which:
//! - Reads listings known from previous runs
//! - Routes each search URL to its site gateway, opening gateways lazily
//! - Computes net new listings per search
//! - Sends alerts unless running in shadow mode
//! - Appends net new listings to the store
//!
//! A failed search is logged and skipped. Errors that make the rest of the
//! run pointless (proxy exhaustion, configuration errors, cancellation)
//! abort it.

use crate::config::{Config, SearchEntry};
use crate::crawler::search::SearchCrawler;
use crate::notify::{listing_message, Notifier};
use crate::storage::{RunStatus, SeenStore};
use crate::WatchError;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outcome counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_uuid: String,
    /// Searches crawled to completion
    pub completed: usize,
    /// Searches that ended in an error
    pub failed: usize,
    /// Searches with no matching site or missing proxies
    pub skipped: usize,
    pub net_new: usize,
    pub notified: usize,
}

/// Main coordinator structure
pub struct Coordinator<S> {
    config: Arc<Config>,
    store: S,
    notifier: Option<Arc<dyn Notifier>>,
    proxies: Vec<String>,
    run_uuid: String,
    config_hash: String,
    shadow: bool,
    cancel: CancellationToken,
}

impl<S: SeenStore> Coordinator<S> {
    /// Creates a coordinator for one run with a fresh run id
    pub fn new(config: Config, store: S, proxies: Vec<String>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            notifier: None,
            proxies,
            run_uuid: Uuid::new_v4().to_string(),
            config_hash: String::new(),
            shadow: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Crawl and persist, but do not send alerts
    pub fn with_shadow(mut self, shadow: bool) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_config_hash(mut self, config_hash: &str) -> Self {
        self.config_hash = config_hash.to_string();
        self
    }

    /// Token that aborts the run between pages when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run_uuid(&self) -> &str {
        &self.run_uuid
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs every configured search once
    pub async fn run(&mut self) -> Result<RunSummary, WatchError> {
        tracing::info!("Starting run {}", self.run_uuid);
        self.store.start_run(&self.run_uuid, &self.config_hash)?;

        let mut summary = RunSummary {
            run_uuid: self.run_uuid.clone(),
            ..Default::default()
        };
        let result = self.run_searches(&mut summary).await;

        let status = match &result {
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                tracing::error!("Run {} aborted: {}", self.run_uuid, e);
                RunStatus::Failed
            }
        };
        self.store
            .finish_run(&self.run_uuid, status, summary.net_new as u64)?;
        result?;

        tracing::info!(
            "Run completed: {} searches done, {} failed, {} skipped, {} net new, {} alerts sent",
            summary.completed,
            summary.failed,
            summary.skipped,
            summary.net_new,
            summary.notified
        );
        Ok(summary)
    }

    async fn run_searches(&mut self, summary: &mut RunSummary) -> Result<(), WatchError> {
        let config = self.config.clone();
        let known = self.store.known_urls()?;
        tracing::debug!("Read {} known listings from the store", known.len());

        let mut gateways: HashMap<String, SearchCrawler> = HashMap::new();
        let mut reported: HashSet<String> = HashSet::new();

        if self.notifier.is_none() && !self.shadow {
            tracing::info!("No notifier configured, new listings will only be stored");
        }

        for search in &config.searches {
            if self.cancel.is_cancelled() {
                return Err(WatchError::Cancelled);
            }

            let Some(site) = config.site_for(&search.url) else {
                tracing::warn!("No site matches {}, skipping", search.url);
                summary.skipped += 1;
                continue;
            };

            if site.require_proxies && self.proxies.is_empty() {
                tracing::warn!(
                    "Site {} requires proxies but none were loaded, skipping {}",
                    site.name,
                    search.url
                );
                summary.skipped += 1;
                continue;
            }

            if !gateways.contains_key(&site.name) {
                match SearchCrawler::connect(site, &config.crawler, &self.proxies).await {
                    Ok(gateway) => {
                        gateways.insert(site.name.clone(), gateway);
                    }
                    Err(e) if e.is_run_fatal() => return Err(e),
                    Err(e) => {
                        tracing::warn!("Could not open gateway for {}: {}", site.name, e);
                        summary.failed += 1;
                        continue;
                    }
                }
            }
            let Some(gateway) = gateways.get(&site.name) else {
                continue;
            };

            let found = match self.search(gateway, search).await {
                Ok(found) => found,
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Search {} failed: {}", search.url, e);
                    summary.failed += 1;
                    continue;
                }
            };
            summary.completed += 1;

            let net_new: BTreeSet<String> = found
                .into_iter()
                .filter(|url| !known.contains(url) && !reported.contains(url))
                .collect();
            tracing::debug!("Got {} net new listings from {}", net_new.len(), search.url);

            if net_new.is_empty() {
                continue;
            }

            summary.net_new += net_new.len();
            summary.notified += self.notify(&net_new).await;

            self.store.append(
                &net_new,
                &search.url,
                &self.run_uuid,
                Utc::now().timestamp_millis(),
            )?;
            reported.extend(net_new);
        }

        Ok(())
    }

    async fn search(
        &self,
        gateway: &SearchCrawler,
        search: &SearchEntry,
    ) -> Result<BTreeSet<String>, WatchError> {
        let mode = search.mode()?;
        gateway.perform_search(&search.url, mode, &self.cancel).await
    }

    /// Sends one alert per listing, returning how many were delivered
    async fn notify(&self, listings: &BTreeSet<String>) -> usize {
        if self.shadow {
            tracing::debug!("Shadow mode, not sending {} alerts", listings.len());
            return 0;
        }
        let Some(notifier) = &self.notifier else {
            return 0;
        };

        let mut delivered = 0;
        for listing in listings {
            tracing::debug!("Sending an alert on {}", listing);
            if notifier.send(&listing_message(listing)).await {
                delivered += 1;
            } else {
                tracing::warn!("Message failed for {}", listing);
            }
        }
        delivered
    }
}
