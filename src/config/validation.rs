use crate::config::types::{
    Config, CrawlerConfig, NotifierConfig, ProxiesConfig, SearchEntry, SiteConfig, StoreConfig,
};
use crate::crawler::LinkExtractor;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_store_config(&config.store)?;
    if let Some(notifier) = &config.notifier {
        validate_notifier_config(notifier)?;
    }
    validate_proxies_config(&config.proxies)?;
    validate_sites(&config.sites)?;
    validate_searches(&config.searches)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.zero_results_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "zero_results_attempts must be >= 1, got {}",
            config.zero_results_attempts
        )));
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_notifier_config(config: &NotifierConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "notifier base_url")?;

    if config.bot_secret.is_empty() {
        return Err(ConfigError::Validation(
            "notifier bot_secret cannot be empty".to_string(),
        ));
    }

    validate_rps(config.rps, "notifier")
}

fn validate_proxies_config(config: &ProxiesConfig) -> Result<(), ConfigError> {
    if let Some(source) = &config.source_url {
        validate_http_url(source, "proxies source_url")?;
    }

    if let Some(empty) = config.addresses.iter().find(|a| a.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "proxy address cannot be blank, got '{}'",
            empty
        )));
    }

    Ok(())
}

/// Validates site entries, including their selectors and regexes
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for site in sites {
        if site.name.is_empty() {
            return Err(ConfigError::Validation(
                "site name cannot be empty".to_string(),
            ));
        }

        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name '{}'",
                site.name
            )));
        }

        if site.url_match.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' must have a non-empty match string",
                site.name
            )));
        }

        validate_http_url(&site.base_url, &format!("site '{}' base_url", site.name))?;

        if let Some(auth_url) = &site.auth_url {
            validate_http_url(auth_url, &format!("site '{}' auth_url", site.name))?;
        }

        validate_rps(site.rps, &site.name)?;

        if site.concurrent_requests == Some(0) {
            return Err(ConfigError::Validation(format!(
                "site '{}' concurrent_requests must be >= 1",
                site.name
            )));
        }

        if site.require_proxies && !site.use_proxies {
            return Err(ConfigError::Validation(format!(
                "site '{}' requires proxies but does not use them",
                site.name
            )));
        }

        // Builds the selectors and regexes once so broken ones fail at load time
        LinkExtractor::from_site(site)?;
    }

    Ok(())
}

fn validate_searches(searches: &[SearchEntry]) -> Result<(), ConfigError> {
    for search in searches {
        validate_http_url(&search.url, "search url")?;
        search.mode()?;
    }
    Ok(())
}

fn validate_rps(rps: f64, owner: &str) -> Result<(), ConfigError> {
    if !rps.is_finite() || rps <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} rps must be a positive number, got {}",
            owner, rps
        )));
    }
    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}
