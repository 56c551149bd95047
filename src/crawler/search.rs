//! Paginated search over one listing site
//!
//! A [`SearchCrawler`] is the per-site gateway: a [`PageFetcher`] paced by
//! the site's limiter, the site's [`LinkExtractor`], and the [`CrawlSession`]
//! that every search against the site adds to.
//!
//! Each search walks the result pages iteratively:
//!
//! 1. Fetch the page (fetch errors end the search)
//! 2. Extract listing links and add them to the session
//! 3. On an empty page, for sites that retry empty pages, rotate the proxy
//!    and fetch the same page again, up to the zero-result retry budget
//! 4. Stop when the site deems the count terminal or there is no next page

use crate::config::{CrawlerConfig, SiteConfig};
use crate::crawler::extractor::{LinkExtractor, PaginationCursor, SearchMode};
use crate::crawler::fetcher::{FetchedPage, HttpTransport, PageFetcher, Transport};
use crate::crawler::limiter::RateLimiter;
use crate::crawler::proxy::ProxyRotator;
use crate::crawler::retry::{Attempt, RetryPolicy};
use crate::crawler::session::CrawlSession;
use crate::WatchError;
use scraper::Html;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a single fetched page means for the search
#[derive(Debug)]
enum PageScan {
    /// No results on a site that retries empty pages
    Empty,
    /// Results found; carry on with the cursor
    Continue(PaginationCursor),
}

/// Crawls searches on one site
pub struct SearchCrawler<T = HttpTransport> {
    site: String,
    fetcher: PageFetcher<T>,
    extractor: LinkExtractor,
    session: CrawlSession,
    zero_results: RetryPolicy,
}

impl SearchCrawler<HttpTransport> {
    /// Builds the gateway for a configured site
    ///
    /// A rotator over `proxies` is attached when the site uses proxies and
    /// the list is not empty; the first proxy is taken up front. The site's
    /// auth URL, if any, is fetched once to seed the cookie jar.
    pub async fn connect(
        site: &SiteConfig,
        crawler: &CrawlerConfig,
        proxies: &[String],
    ) -> Result<Self, WatchError> {
        let limiter = Arc::new(RateLimiter::new(site.rps, site.concurrent_requests)?);
        let transport = HttpTransport::new(
            &site.headers,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;

        let rotator = if site.use_proxies && !proxies.is_empty() {
            Some(Arc::new(ProxyRotator::new(proxies.to_vec())))
        } else {
            None
        };

        let gateway = Self::new(
            &site.name,
            PageFetcher::new(transport, limiter, rotator),
            LinkExtractor::from_site(site)?,
            RetryPolicy::new(
                crawler.zero_results_attempts,
                Duration::from_secs(crawler.zero_results_delay_secs),
            ),
        );

        gateway.warm_up(site.auth_url.as_deref()).await?;
        Ok(gateway)
    }
}

impl<T: Transport> SearchCrawler<T> {
    pub fn new(
        site: &str,
        fetcher: PageFetcher<T>,
        extractor: LinkExtractor,
        zero_results: RetryPolicy,
    ) -> Self {
        Self {
            site: site.to_string(),
            fetcher,
            extractor,
            session: CrawlSession::new(),
            zero_results,
        }
    }

    /// Takes the first proxy and fetches the auth URL
    ///
    /// Only running out of proxies is an error here; a failed auth fetch is
    /// logged and ignored.
    pub async fn warm_up(&self, auth_url: Option<&str>) -> Result<(), WatchError> {
        if self.fetcher.has_proxies() {
            self.fetcher.rotate_proxy().await?;
        }

        if let Some(url) = auth_url {
            match self.fetcher.fetch_once(url).await {
                Ok(_) => tracing::debug!("Warmed up {} session via {}", self.site, url),
                Err(e) => tracing::warn!("Auth request for {} failed: {}", self.site, e),
            }
        }

        Ok(())
    }

    /// Crawls every page of `search_url` and returns the session's URLs
    ///
    /// The returned set includes URLs found by earlier searches against this
    /// gateway, since the session is shared until [`CrawlSession::reset`].
    /// `cancel` is checked before every page and cuts retry delays short.
    pub async fn perform_search(
        &self,
        search_url: &str,
        mode: SearchMode,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>, WatchError> {
        self.extractor.check_mode(mode)?;
        tracing::info!("Searching {} ({}) on {}", search_url, mode, self.site);

        let retry = self.zero_results.clone().with_cancel(cancel.clone());
        let mut url = search_url.to_string();
        let mut pages = 0usize;

        loop {
            let cursor = self.crawl_page(&url, mode, &retry, cancel).await?;
            pages += 1;

            match cursor {
                PaginationCursor::Next(next) => {
                    tracing::debug!("Moving on to page {}: {}", pages + 1, next);
                    url = next;
                }
                PaginationCursor::End => break,
            }
        }

        tracing::info!(
            "Done with {} after {} page(s), {} listing(s) in session",
            search_url,
            pages,
            self.session.len()
        );
        Ok(self.session.snapshot())
    }

    /// Crawls one page, retrying it while it comes back empty
    async fn crawl_page(
        &self,
        url: &str,
        mode: SearchMode,
        retry: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<PaginationCursor, WatchError> {
        let max_attempts = retry.max_attempts();

        retry
            .run(|attempt| async move {
                if cancel.is_cancelled() {
                    return Attempt::Fatal(WatchError::Cancelled);
                }

                let page = match self.fetcher.fetch(url).await {
                    Ok(page) => page,
                    Err(e) => return Attempt::Fatal(e),
                };

                match self.scan(&page, mode) {
                    Ok(PageScan::Continue(cursor)) => Attempt::Done(cursor),
                    Ok(PageScan::Empty) => {
                        tracing::info!(
                            "No listings on {} (attempt {}/{})",
                            url,
                            attempt,
                            max_attempts
                        );
                        if attempt < max_attempts {
                            if let Err(e) = self.fetcher.rotate_proxy().await {
                                return Attempt::Fatal(e);
                            }
                        }
                        Attempt::Retry(WatchError::ZeroListingsFound {
                            url: url.to_string(),
                            attempts: attempt,
                        })
                    }
                    Err(e) => Attempt::Fatal(e),
                }
            })
            .await
    }

    /// Extracts a page's links into the session and decides what comes next
    fn scan(&self, page: &FetchedPage, mode: SearchMode) -> Result<PageScan, WatchError> {
        let document = Html::parse_document(&page.html);

        let found = self.extractor.extract_links(&document, mode, &self.session)?;
        let newly_added = self.session.extend(&found);
        let count = self.extractor.result_count(found.len(), newly_added);
        tracing::debug!(
            "Found {} listing(s) on {}, {} new to session",
            found.len(),
            page.url,
            newly_added
        );

        if count == 0 && self.extractor.retries_empty_pages() {
            return Ok(PageScan::Empty);
        }
        if self.extractor.is_terminal(count) {
            tracing::debug!("{} result(s) is the last page for {}", count, self.site);
            return Ok(PageScan::Continue(PaginationCursor::End));
        }

        Ok(PageScan::Continue(
            self.extractor.next_page(&document, &page.url)?,
        ))
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn fetcher(&self) -> &PageFetcher<T> {
        &self.fetcher
    }
}
