//! Per-site listing link extraction and pagination
//!
//! Two site layouts are supported:
//!
//! - **Anchor pattern**: listings are ordinary `<a href>` links whose URL
//!   contains a mode-specific pattern; the next page is linked from a
//!   pagination control found by CSS selector.
//! - **Embedded JSON**: listings are published in a JSON-LD `ItemList`
//!   block; the next page is computed by bumping a page-number query
//!   parameter in the search URL.
//!
//! The two variants also count results differently, which drives when a
//! search ends: see [`LinkExtractor::result_count`].

use crate::config::{SiteConfig, SiteKind};
use crate::crawler::session::CrawlSession;
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Which kind of listings a search looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    Rent,
    Buy,
}

impl FromStr for SearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rent" => Ok(Self::Rent),
            "buy" => Ok(Self::Buy),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rent => f.write_str("rent"),
            Self::Buy => f.write_str("buy"),
        }
    }
}

/// Locator of the next result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationCursor {
    Next(String),
    End,
}

/// Site whose listings are plain anchors matching a URL pattern
#[derive(Debug)]
pub struct AnchorPatternSite {
    base_url: Url,
    rent_pattern: Option<String>,
    buy_pattern: Option<String>,
    anchors: Selector,
    next_page: Selector,
}

impl AnchorPatternSite {
    pub fn new(
        base_url: &str,
        rent_pattern: Option<String>,
        buy_pattern: Option<String>,
        next_page_selector: &str,
    ) -> Result<Self, ConfigError> {
        if rent_pattern.is_none() && buy_pattern.is_none() {
            return Err(ConfigError::Validation(
                "anchor-pattern site needs a rent-pattern or a buy-pattern".to_string(),
            ));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            base_url,
            rent_pattern,
            buy_pattern,
            anchors: parse_selector("a[href]")?,
            next_page: parse_selector(next_page_selector)?,
        })
    }

    /// Returns the listing URL pattern for `mode`
    pub fn pattern_for(&self, mode: SearchMode) -> Result<&str, ConfigError> {
        let pattern = match mode {
            SearchMode::Rent => self.rent_pattern.as_deref(),
            SearchMode::Buy => self.buy_pattern.as_deref(),
        };
        pattern.ok_or_else(|| {
            ConfigError::UnsupportedMode(format!("{} (no listing pattern configured)", mode))
        })
    }

    /// Collects anchors matching the mode's pattern that the session lacks
    fn extract_links(
        &self,
        document: &Html,
        mode: SearchMode,
        session: &CrawlSession,
    ) -> Result<BTreeSet<String>, ConfigError> {
        let pattern = self.pattern_for(mode)?;
        let mut found = BTreeSet::new();

        for element in document.select(&self.anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(listing) = qualify_link(href, &self.base_url) else {
                continue;
            };

            if !listing.contains(pattern) {
                tracing::trace!("{} does not match {} pattern", listing, pattern);
                continue;
            }
            if session.contains(&listing) {
                continue;
            }

            tracing::debug!("{} is a net new {} listing", listing, mode);
            found.insert(listing);
        }

        Ok(found)
    }

    /// Follows the pagination control, if the page has one
    fn next_page(&self, document: &Html) -> PaginationCursor {
        let Some(control) = document.select(&self.next_page).next() else {
            tracing::debug!("Reached the last page of search");
            return PaginationCursor::End;
        };

        let href = control
            .value()
            .attr("href")
            .or_else(|| {
                control
                    .select(&self.anchors)
                    .next()
                    .and_then(|a| a.value().attr("href"))
            });

        match href.and_then(|href| qualify_link(href, &self.base_url)) {
            Some(next) => PaginationCursor::Next(next),
            None => {
                tracing::debug!("Pagination control has no usable link");
                PaginationCursor::End
            }
        }
    }
}

/// Site publishing its listings in a JSON-LD `ItemList`
#[derive(Debug)]
pub struct EmbeddedJsonSite {
    results_per_page: usize,
    page_param: String,
    page_pattern: Regex,
    scripts: Selector,
}

/// Default query parameter carrying the page number
pub const DEFAULT_PAGE_PARAM: &str = "search_result";

impl EmbeddedJsonSite {
    /// Creates the site rules
    ///
    /// Without an explicit `page_regex`, the page number is matched as
    /// `&{page_param}=(\d+)`.
    pub fn new(
        results_per_page: usize,
        page_param: &str,
        page_regex: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if results_per_page == 0 {
            return Err(ConfigError::Validation(
                "results_per_page must be >= 1".to_string(),
            ));
        }

        let pattern = match page_regex {
            Some(pattern) => pattern.to_string(),
            None => format!(r"&{}=(\d+)", regex::escape(page_param)),
        };
        let page_pattern = Regex::new(&pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        if page_pattern.captures_len() < 2 {
            return Err(ConfigError::InvalidPattern(format!(
                "'{}' needs a capture group for the page number",
                pattern
            )));
        }

        Ok(Self {
            results_per_page,
            page_param: page_param.to_string(),
            page_pattern,
            scripts: parse_selector(r#"script[type="application/ld+json"]"#)?,
        })
    }

    /// Reads listing URLs from the first JSON-LD block holding an item list
    ///
    /// A missing or malformed block counts as a page without results.
    fn extract_links(&self, document: &Html) -> BTreeSet<String> {
        for script in document.select(&self.scripts) {
            let text: String = script.text().collect();
            match serde_json::from_str::<ItemList>(text.trim()) {
                Ok(ItemList {
                    items: Some(items),
                }) => {
                    return items.into_iter().filter_map(|item| item.url).collect();
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Skipping malformed JSON-LD block: {}", e);
                    continue;
                }
            }
        }

        tracing::debug!("No listings on page");
        BTreeSet::new()
    }

    /// Computes the next page URL by bumping the page-number parameter
    pub fn next_page(&self, current_url: &str) -> Result<PaginationCursor, ConfigError> {
        let matches: Vec<_> = self.page_pattern.captures_iter(current_url).collect();

        if matches.len() > 1 {
            return Err(ConfigError::AmbiguousPagination {
                pattern: self.page_pattern.as_str().to_string(),
                url: current_url.to_string(),
            });
        }

        let Some(captures) = matches.first() else {
            return Ok(PaginationCursor::Next(format!(
                "{}{}{}=2",
                current_url,
                query_joiner(current_url),
                self.page_param
            )));
        };

        let raw = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let page: u64 = raw.parse().map_err(|_| {
            ConfigError::InvalidPattern(format!(
                "page number '{}' in {} is not a number",
                raw, current_url
            ))
        })?;
        tracing::debug!("Current page is {} for {}", page, current_url);

        let clean = self.page_pattern.replace(current_url, "");
        Ok(PaginationCursor::Next(format!(
            "{}{}{}={}",
            clean,
            query_joiner(&clean),
            self.page_param,
            page + 1
        )))
    }
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(rename = "itemListElement", default)]
    items: Option<Vec<ListItem>>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(default)]
    url: Option<String>,
}

/// Site-specific link extraction and pagination rules
#[derive(Debug)]
pub enum LinkExtractor {
    AnchorPattern(AnchorPatternSite),
    EmbeddedJson(EmbeddedJsonSite),
}

impl LinkExtractor {
    /// Builds the extractor described by a site entry
    pub fn from_site(site: &SiteConfig) -> Result<Self, ConfigError> {
        match site.kind {
            SiteKind::AnchorPattern => {
                let selector = site.next_page_selector.as_deref().ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "site '{}' needs a next-page-selector",
                        site.name
                    ))
                })?;
                Ok(Self::AnchorPattern(AnchorPatternSite::new(
                    &site.base_url,
                    site.rent_pattern.clone(),
                    site.buy_pattern.clone(),
                    selector,
                )?))
            }
            SiteKind::EmbeddedJson => {
                let results_per_page = site.results_per_page.ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "site '{}' needs results-per-page",
                        site.name
                    ))
                })?;
                Ok(Self::EmbeddedJson(EmbeddedJsonSite::new(
                    results_per_page,
                    site.page_param.as_deref().unwrap_or(DEFAULT_PAGE_PARAM),
                    site.next_page_regex.as_deref(),
                )?))
            }
        }
    }

    /// Fails fast when the site cannot search in `mode`
    pub fn check_mode(&self, mode: SearchMode) -> Result<(), ConfigError> {
        match self {
            Self::AnchorPattern(site) => site.pattern_for(mode).map(|_| ()),
            Self::EmbeddedJson(_) => Ok(()),
        }
    }

    /// Returns the candidate listing URLs on a page
    pub fn extract_links(
        &self,
        document: &Html,
        mode: SearchMode,
        session: &CrawlSession,
    ) -> Result<BTreeSet<String>, ConfigError> {
        match self {
            Self::AnchorPattern(site) => site.extract_links(document, mode, session),
            Self::EmbeddedJson(site) => Ok(site.extract_links(document)),
        }
    }

    /// Returns the cursor for the page after `current_url`
    pub fn next_page(
        &self,
        document: &Html,
        current_url: &str,
    ) -> Result<PaginationCursor, ConfigError> {
        match self {
            Self::AnchorPattern(site) => Ok(site.next_page(document)),
            Self::EmbeddedJson(site) => site.next_page(current_url),
        }
    }

    /// The page's result count used for termination decisions
    ///
    /// Anchor sites count only URLs new to the session; JSON sites count
    /// every URL on the page, new or not.
    pub fn result_count(&self, found: usize, newly_added: usize) -> usize {
        match self {
            Self::AnchorPattern(_) => newly_added,
            Self::EmbeddedJson(_) => found,
        }
    }

    /// Whether a page with `count` results is the last one
    pub fn is_terminal(&self, count: usize) -> bool {
        match self {
            Self::AnchorPattern(_) => false,
            Self::EmbeddedJson(site) => count < site.results_per_page,
        }
    }

    /// Whether a page with no results should be fetched again
    pub fn retries_empty_pages(&self) -> bool {
        matches!(self, Self::AnchorPattern(_))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidPattern(format!("selector '{}': {:?}", selector, e)))
}

fn query_joiner(url: &str) -> &'static str {
    if url.contains('?') {
        "&"
    } else {
        "?"
    }
}

/// Qualifies an href against the site's base URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
pub fn qualify_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
