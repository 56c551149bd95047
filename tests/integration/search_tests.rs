//! Searches against mock listing sites over real HTTP

use crate::common::{anchor_page, html, json_page, watch_config, ExactQuery};
use listing_watch::crawler::{SearchCrawler, SearchMode};
use listing_watch::WatchError;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_anchor_search_follows_pagination() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/huren"))
        .respond_with(html(anchor_page(
            &["/huur/1", "/huur/2"],
            Some("/huren/page-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/huren/page-2"))
        .respond_with(html(anchor_page(&["/huur/2", "/huur/3"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let config = watch_config(&uri, "unused.db", "");
    let gateway = SearchCrawler::connect(&config.sites[0], &config.crawler, &[])
        .await
        .unwrap();

    let urls = gateway
        .perform_search(
            &format!("{}/huren", uri),
            SearchMode::Rent,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let expected: Vec<String> = ["/huur/1", "/huur/2", "/huur/3"]
        .iter()
        .map(|p| format!("{}{}", uri, p))
        .collect();
    assert_eq!(urls.into_iter().collect::<Vec<_>>(), expected);
}

#[tokio::test]
async fn test_json_search_follows_page_param() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/zoeken"))
        .and(ExactQuery(Some("area=amsterdam")))
        .respond_with(html(json_page(&["https://f.example/1", "https://f.example/2"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zoeken"))
        .and(ExactQuery(Some("area=amsterdam&search_result=2")))
        .respond_with(html(json_page(&["https://f.example/3"])))
        .expect(1)
        .mount(&server)
        .await;

    let config = watch_config(&uri, "unused.db", "");
    let gateway = SearchCrawler::connect(&config.sites[1], &config.crawler, &[])
        .await
        .unwrap();

    let urls = gateway
        .perform_search(
            &format!("{}/zoeken?area=amsterdam", uri),
            SearchMode::Buy,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(urls.len(), 3);
    assert!(urls.contains("https://f.example/3"));
}

#[tokio::test]
async fn test_server_error_without_proxies_is_surfaced() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/huren"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let config = watch_config(&uri, "unused.db", "");
    let gateway = SearchCrawler::connect(&config.sites[0], &config.crawler, &[])
        .await
        .unwrap();

    let err = gateway
        .perform_search(
            &format!("{}/huren", uri),
            SearchMode::Rent,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WatchError::ServerStatus { status: 503, .. }));
    assert!(!err.is_run_fatal());
}

#[tokio::test]
async fn test_empty_anchor_page_ends_in_zero_listings() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/huren"))
        .respond_with(html(anchor_page(&[], None)))
        .expect(2)
        .mount(&server)
        .await;

    let config = watch_config(&uri, "unused.db", "");
    let gateway = SearchCrawler::connect(&config.sites[0], &config.crawler, &[])
        .await
        .unwrap();

    let err = gateway
        .perform_search(
            &format!("{}/huren", uri),
            SearchMode::Rent,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WatchError::ZeroListingsFound { attempts: 2, .. }
    ));
}

#[tokio::test]
async fn test_auth_url_cookie_carries_into_searches() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc123; Path=/")
                .set_body_string("ok"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/huren"))
        .and(header("cookie", "session=abc123"))
        .respond_with(html(anchor_page(&["/huur/1"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = watch_config(&uri, "unused.db", "");
    config.sites[0].auth_url = Some(format!("{}/login", uri));
    let gateway = SearchCrawler::connect(&config.sites[0], &config.crawler, &[])
        .await
        .unwrap();

    let urls = gateway
        .perform_search(
            &format!("{}/huren", uri),
            SearchMode::Rent,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(urls.len(), 1);
}

#[tokio::test]
async fn test_site_headers_are_sent() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/zoeken"))
        .and(header("user-agent", "Mozilla/5.0 (listing-watch test)"))
        .respond_with(html(json_page(&["https://f.example/1"])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = watch_config(&uri, "unused.db", "");
    config.sites[1].headers.insert(
        "User-Agent".to_string(),
        "Mozilla/5.0 (listing-watch test)".to_string(),
    );
    let gateway = SearchCrawler::connect(&config.sites[1], &config.crawler, &[])
        .await
        .unwrap();

    let urls = gateway
        .perform_search(
            &format!("{}/zoeken?area=x", uri),
            SearchMode::Rent,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(urls.len(), 1);
}
