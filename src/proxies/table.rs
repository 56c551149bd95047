//! Proxies scraped from a public proxy-list page

use crate::crawler::build_header_map;
use crate::proxies::ProxySource;
use crate::WatchError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;

/// Reads `ip` and `port` from the first two cells of each table row
pub struct ProxyTableSource {
    url: String,
    client: Client,
}

impl ProxyTableSource {
    pub fn new(
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, WatchError> {
        let client = Client::builder()
            .default_headers(build_header_map(headers)?)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ProxySource for ProxyTableSource {
    async fn proxies(&self) -> Result<Vec<String>, WatchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(WatchError::ClientStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(WatchError::ServerStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        Ok(parse_proxy_table(&html))
    }
}

/// Extracts `ip:port` pairs from the first table on a page
///
/// Rows with fewer than two cells or an empty cell are skipped.
pub fn parse_proxy_table(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut proxies = Vec::new();

    let (Ok(table_selector), Ok(row_selector), Ok(cell_selector)) = (
        Selector::parse("table"),
        Selector::parse("tbody tr"),
        Selector::parse("td"),
    ) else {
        return proxies;
    };

    let Some(table) = document.select(&table_selector).next() else {
        tracing::warn!("No proxy table on page");
        return proxies;
    };

    for row in table.select(&row_selector) {
        let mut cells = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string());

        match (cells.next(), cells.next()) {
            (Some(ip), Some(port)) if !ip.is_empty() && !port.is_empty() => {
                proxies.push(format!("{}:{}", ip, port));
            }
            _ => tracing::debug!("Skipping malformed proxy row"),
        }
    }

    proxies
}
