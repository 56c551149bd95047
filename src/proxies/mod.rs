//! Proxy list acquisition
//!
//! A proxy source is consulted once at the start of a run and yields an
//! ordered list of `host:port` addresses. Each site gateway that uses
//! proxies rotates through its own copy of that list.

mod table;

pub use table::{parse_proxy_table, ProxyTableSource};

use crate::config::ProxiesConfig;
use crate::WatchError;
use async_trait::async_trait;
use std::time::Duration;

/// Provider of proxy addresses
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn proxies(&self) -> Result<Vec<String>, WatchError>;
}

/// Fixed list of proxies from the configuration file
#[derive(Debug, Clone, Default)]
pub struct StaticProxySource {
    addresses: Vec<String>,
}

impl StaticProxySource {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl ProxySource for StaticProxySource {
    async fn proxies(&self) -> Result<Vec<String>, WatchError> {
        Ok(self.addresses.clone())
    }
}

/// Loads the proxy list described by the `[proxies]` section
///
/// Configured addresses come first, followed by anything scraped from the
/// proxy-list page.
pub async fn load_proxies(
    config: &ProxiesConfig,
    timeout: Duration,
) -> Result<Vec<String>, WatchError> {
    let mut proxies = StaticProxySource::new(config.addresses.clone())
        .proxies()
        .await?;

    if let Some(url) = &config.source_url {
        let source = ProxyTableSource::new(url, &config.source_headers, timeout)?;
        let scraped = source.proxies().await?;
        tracing::info!("Fetched {} proxies from {}", scraped.len(), url);
        proxies.extend(scraped);
    }

    Ok(proxies)
}
