//! Shared fixtures for the integration tests

use listing_watch::config::{parse_config, Config};
use wiremock::{Match, Request, ResponseTemplate};

/// Matches a request whose query string is exactly the given one
pub struct ExactQuery(pub Option<&'static str>);

impl Match for ExactQuery {
    fn matches(&self, request: &Request) -> bool {
        request.url.query() == self.0
    }
}

/// A 200 HTML response
pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html")
}

/// Search page with listing anchors and an optional next-page control
pub fn anchor_page(listings: &[&str], next: Option<&str>) -> String {
    let links: String = listings
        .iter()
        .map(|href| format!(r#"<li class="listing"><a href="{}">Apartment</a></li>"#, href))
        .collect();
    let pagination = next
        .map(|href| format!(r#"<li class="next"><a href="{}">Next</a></li>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body>
        <a href="/about">About</a>
        <ul class="results">{}</ul>
        <ul class="pagination"><li>1</li>{}</ul>
        </body></html>"#,
        links, pagination
    )
}

/// Search page publishing its listings as a JSON-LD item list
pub fn json_page(listings: &[&str]) -> String {
    let items: Vec<String> = listings
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"{{"@type":"ListItem","position":{},"url":"{}"}}"#,
                i + 1,
                url
            )
        })
        .collect();

    format!(
        r#"<html><head>
        <script type="application/ld+json">{{"@context":"https://schema.org","@type":"Organization","name":"f"}}</script>
        <script type="application/ld+json">{{"@context":"https://schema.org","@type":"ItemList","itemListElement":[{}]}}</script>
        </head><body></body></html>"#,
        items.join(",")
    )
}

/// Config with an anchor-pattern site matching `/huren` and an
/// embedded-JSON site matching `/zoeken`, both served by `server_uri`
///
/// `extra` is appended verbatim, typically `[[search]]` entries.
pub fn watch_config(server_uri: &str, database_path: &str, extra: &str) -> Config {
    let content = format!(
        r#"
[crawler]
request-timeout-secs = 5
zero-results-attempts = 2
zero-results-delay-secs = 0

[store]
database-path = "{db}"

[[site]]
name = "anchor"
match = "/huren"
kind = "anchor-pattern"
base-url = "{uri}"
rent-pattern = "/huur/"
next-page-selector = "li.next"
rps = 100.0

[[site]]
name = "json"
match = "/zoeken"
kind = "embedded-json"
base-url = "{uri}"
results-per-page = 2
rps = 100.0

{extra}
"#,
        db = database_path,
        uri = server_uri,
        extra = extra
    );

    parse_config(&content).expect("test config should be valid")
}
