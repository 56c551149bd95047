use crate::crawler::SearchMode;
use crate::ConfigResult;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Listing-Watch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub proxies: ProxiesConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
    #[serde(default, rename = "search")]
    pub searches: Vec<SearchEntry>,
}

impl Config {
    /// Picks the site whose `match` substring appears in the search URL.
    ///
    /// Sites are tried in declaration order, the first hit wins.
    pub fn site_for(&self, search_url: &str) -> Option<&SiteConfig> {
        self.sites
            .iter()
            .find(|site| search_url.contains(&site.url_match))
    }
}

/// Crawl behaviour shared by every site
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Per-request socket timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total attempts for a page that keeps yielding zero listings
    #[serde(rename = "zero-results-attempts", default = "default_zero_attempts")]
    pub zero_results_attempts: u32,

    /// Delay between zero-listing attempts (seconds)
    #[serde(rename = "zero-results-delay-secs", default = "default_zero_delay")]
    pub zero_results_delay_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            zero_results_attempts: default_zero_attempts(),
            zero_results_delay_secs: default_zero_delay(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

fn default_zero_attempts() -> u32 {
    50
}

fn default_zero_delay() -> u64 {
    2
}

/// Seen-listing database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Telegram bot used to deliver new-listing alerts
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(rename = "base-url", default = "default_telegram_url")]
    pub base_url: String,

    #[serde(rename = "bot-secret")]
    pub bot_secret: String,

    #[serde(rename = "chat-id")]
    pub chat_id: i64,

    #[serde(rename = "send-endpoint", default = "default_send_endpoint")]
    pub send_endpoint: String,

    #[serde(default = "default_notifier_rps")]
    pub rps: f64,
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_send_endpoint() -> String {
    "sendMessage".to_string()
}

fn default_notifier_rps() -> f64 {
    1.0
}

/// Where egress proxies come from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxiesConfig {
    /// Fixed `host:port` entries, used first and in order
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Proxy-list page fetched once at startup and appended to `addresses`
    #[serde(rename = "source-url", default)]
    pub source_url: Option<String>,

    /// Extra headers sent with the proxy-list request
    #[serde(rename = "source-headers", default)]
    pub source_headers: BTreeMap<String, String>,
}

/// How a site exposes its listings and pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteKind {
    /// Listing links are plain anchors matching a URL pattern
    AnchorPattern,
    /// Listing links live in a JSON-LD `ItemList` block
    EmbeddedJson,
}

/// One monitored listing site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,

    /// Substring identifying this site's search URLs
    #[serde(rename = "match")]
    pub url_match: String,

    pub kind: SiteKind,

    /// Base URL that relative hrefs are qualified against
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "rent-pattern", default)]
    pub rent_pattern: Option<String>,

    #[serde(rename = "buy-pattern", default)]
    pub buy_pattern: Option<String>,

    /// CSS selector of the "next page" pagination control
    #[serde(rename = "next-page-selector", default)]
    pub next_page_selector: Option<String>,

    /// Regex with one capture group for the page number in a search URL
    #[serde(rename = "next-page-regex", default)]
    pub next_page_regex: Option<String>,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param", default)]
    pub page_param: Option<String>,

    /// Number of results on a full page
    #[serde(rename = "results-per-page", default)]
    pub results_per_page: Option<usize>,

    /// Requests per second allowed against this site
    pub rps: f64,

    /// Maximum number of requests in flight at once
    #[serde(rename = "concurrent-requests", default)]
    pub concurrent_requests: Option<usize>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Route this site's requests through the proxy pool
    #[serde(rename = "use-proxies", default)]
    pub use_proxies: bool,

    /// Skip this site's searches entirely when no proxies are available
    #[serde(rename = "require-proxies", default)]
    pub require_proxies: bool,

    /// Page fetched once at startup to obtain session cookies
    #[serde(rename = "auth-url", default)]
    pub auth_url: Option<String>,
}

/// A search results URL to monitor
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEntry {
    pub url: String,
    pub mode: String,
}

impl SearchEntry {
    pub fn mode(&self) -> ConfigResult<SearchMode> {
        self.mode.parse()
    }
}
