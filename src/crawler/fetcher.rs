//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building HTTP clients with site headers, timeout and proxy
//! - Pacing every request through the site's rate limiter
//! - Classifying responses into [`PageOutcome`]s
//! - Rotating to the next proxy and retrying on failure
//!
//! # Retry Logic
//!
//! | Condition | With proxies | Without proxies |
//! |-----------|--------------|-----------------|
//! | HTTP 4xx | Rotate, retry same URL | Return `ClientStatus` |
//! | HTTP 5xx | Rotate, retry same URL | Return `ServerStatus` |
//! | Timeout / connection / proxy error | Rotate, retry same URL | Return `Transport` |
//! | Body is not valid UTF-8 | Return `Parse` | Return `Parse` |
//! | Pool exhausted | Return `ProxiesExhausted` | n/a |
//!
//! Retries are bounded only by the size of the proxy pool.

use crate::crawler::limiter::RateLimiter;
use crate::crawler::proxy::ProxyRotator;
use crate::{ConfigError, WatchError};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Result of a single GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Any status below 400, with the raw body
    Ok(Vec<u8>),

    /// HTTP 400-499
    ClientError { status: u16, body: String },

    /// HTTP 500 and above
    ServerError { status: u16, body: String },

    /// Timeout, connection refused, proxy failure and the like
    TransportFailure(String),
}

impl PageOutcome {
    /// Classifies a response by status code
    pub fn from_response(status: u16, body: Vec<u8>) -> Self {
        match status {
            400..=499 => Self::ClientError {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            },
            500..=u16::MAX => Self::ServerError {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            },
            _ => Self::Ok(body),
        }
    }

    /// Converts a failed outcome into the matching error
    fn into_error(self, url: &str) -> WatchError {
        let url = url.to_string();
        match self {
            Self::ClientError { status, .. } => WatchError::ClientStatus { url, status },
            Self::ServerError { status, .. } => WatchError::ServerStatus { url, status },
            Self::TransportFailure(cause) => WatchError::Transport { url, cause },
            Self::Ok(_) => WatchError::Parse {
                url,
                message: "successful response treated as failure".to_string(),
            },
        }
    }
}

/// A successfully fetched and decoded page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

impl FetchedPage {
    fn decode(url: &str, body: Vec<u8>) -> Result<Self, WatchError> {
        let html = String::from_utf8(body).map_err(|e| WatchError::Parse {
            url: url.to_string(),
            message: format!("body is not valid UTF-8: {}", e),
        })?;

        Ok(Self {
            url: url.to_string(),
            html,
        })
    }
}

/// The network side of the fetcher
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one GET and classifies the result
    async fn get(&self, url: &str) -> PageOutcome;

    /// Routes subsequent requests through `proxy`, or directly when `None`
    fn set_proxy(&self, proxy: Option<&str>) -> Result<(), WatchError>;
}

/// reqwest-backed transport
///
/// The cookie jar is shared by every client the transport builds, so
/// switching proxies keeps the site session.
pub struct HttpTransport {
    client: RwLock<Client>,
    headers: HeaderMap,
    timeout: Duration,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Creates a direct (unproxied) transport
    pub fn new(headers: &BTreeMap<String, String>, timeout: Duration) -> Result<Self, WatchError> {
        let headers = build_header_map(headers)?;
        let jar = Arc::new(Jar::default());
        let client = build_http_client(&headers, timeout, &jar, None)?;

        Ok(Self {
            client: RwLock::new(client),
            headers,
            timeout,
            jar,
        })
    }

    fn current_client(&self) -> Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> PageOutcome {
        let client = self.current_client();

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return PageOutcome::TransportFailure(describe_error(&e)),
        };

        let status = response.status().as_u16();
        tracing::debug!("Got status {} for {}", status, url);

        match response.bytes().await {
            Ok(body) => PageOutcome::from_response(status, body.to_vec()),
            Err(e) => PageOutcome::TransportFailure(describe_error(&e)),
        }
    }

    fn set_proxy(&self, proxy: Option<&str>) -> Result<(), WatchError> {
        let client = build_http_client(&self.headers, self.timeout, &self.jar, proxy)?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
        Ok(())
    }
}

/// Converts configured header pairs into a `HeaderMap`
pub fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::Validation(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid value for header '{}': {}", name, e))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Builds an HTTP client with proper configuration
///
/// Certificate checks are relaxed while a proxy is in use, since free
/// proxies commonly intercept TLS.
pub fn build_http_client(
    headers: &HeaderMap,
    timeout: Duration,
    jar: &Arc<Jar>,
    proxy: Option<&str>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .default_headers(headers.clone())
        .timeout(timeout)
        .cookie_provider(jar.clone())
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder
            .proxy(reqwest::Proxy::all(proxy_url(proxy))?)
            .danger_accept_invalid_certs(true);
    }

    builder.build()
}

/// Turns a bare `host:port` proxy entry into a proxy URL
fn proxy_url(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timeout: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

/// Proxy currently in use, versioned so concurrent failures rotate once
#[derive(Debug, Default)]
struct ProxyLease {
    proxy: Option<String>,
    generation: u64,
}

/// Fetches pages through the rate limiter, rotating proxies on failure
pub struct PageFetcher<T = HttpTransport> {
    transport: T,
    limiter: Arc<RateLimiter>,
    rotator: Option<Arc<ProxyRotator>>,
    lease: tokio::sync::RwLock<ProxyLease>,
}

impl<T: Transport> PageFetcher<T> {
    /// Creates a fetcher; requests go direct until the first rotation
    pub fn new(transport: T, limiter: Arc<RateLimiter>, rotator: Option<Arc<ProxyRotator>>) -> Self {
        Self {
            transport,
            limiter,
            rotator,
            lease: tokio::sync::RwLock::new(ProxyLease::default()),
        }
    }

    /// Fetches `url`, retrying through fresh proxies until it succeeds
    ///
    /// Requests are issued while holding a read lease on the current proxy,
    /// so a rotation never happens underneath an in-flight request.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, WatchError> {
        loop {
            let (outcome, generation) = {
                let lease = self.lease.read().await;
                let guard = self.limiter.acquire().await;
                let outcome = self.transport.get(url).await;
                guard.release();
                (outcome, lease.generation)
            };

            let failure = match outcome {
                PageOutcome::Ok(body) => return FetchedPage::decode(url, body),
                failure => failure.into_error(url),
            };

            tracing::warn!("Fetch failed: {}", failure);

            if self.rotator.is_none() {
                tracing::warn!("No proxies supplied, not retrying {}", url);
                return Err(failure);
            }

            self.rotate_after_failure(generation).await?;
        }
    }

    /// Fetches `url` once without rotating on failure
    pub async fn fetch_once(&self, url: &str) -> Result<FetchedPage, WatchError> {
        let _lease = self.lease.read().await;
        let guard = self.limiter.acquire().await;
        let outcome = self.transport.get(url).await;
        guard.release();

        match outcome {
            PageOutcome::Ok(body) => FetchedPage::decode(url, body),
            failure => Err(failure.into_error(url)),
        }
    }

    /// Switches to the next proxy in the pool
    ///
    /// A no-op without a rotator. Fails with `ProxiesExhausted` once the
    /// pool is spent.
    pub async fn rotate_proxy(&self) -> Result<(), WatchError> {
        let mut lease = self.lease.write().await;
        self.switch(&mut lease)
    }

    /// Rotates only if nobody rotated since the failed request was issued
    async fn rotate_after_failure(&self, generation: u64) -> Result<(), WatchError> {
        let mut lease = self.lease.write().await;
        if lease.generation != generation {
            tracing::debug!("Proxy already rotated by a concurrent request");
            return Ok(());
        }
        self.switch(&mut lease)
    }

    fn switch(&self, lease: &mut ProxyLease) -> Result<(), WatchError> {
        let Some(rotator) = &self.rotator else {
            return Ok(());
        };

        let proxy = rotator.next()?.to_string();
        tracing::info!("Updating proxy to {}", proxy);
        self.transport.set_proxy(Some(&proxy))?;
        lease.proxy = Some(proxy);
        lease.generation += 1;
        Ok(())
    }

    /// Returns the proxy currently in use, if any
    pub async fn current_proxy(&self) -> Option<String> {
        self.lease.read().await.proxy.clone()
    }

    pub fn has_proxies(&self) -> bool {
        self.rotator.is_some()
    }

    pub fn rotator(&self) -> Option<&Arc<ProxyRotator>> {
        self.rotator.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
