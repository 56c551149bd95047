//! Whole watch runs against mock sites, a SQLite store and a recording notifier

use crate::common::{anchor_page, html, json_page, watch_config, ExactQuery};
use async_trait::async_trait;
use listing_watch::crawler::Coordinator;
use listing_watch::notify::Notifier;
use listing_watch::storage::{RunStatus, SeenStore, SqliteStore};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

/// Notifier that remembers every message it was asked to send
#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> bool {
        self.messages.lock().unwrap().push(text.to_string());
        true
    }
}

/// Serves a two-page anchor search at `/huren` and a one-page JSON search
/// at `/zoeken?area=amsterdam`
async fn mount_sites(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/huren"))
        .respond_with(html(anchor_page(
            &["/huur/1", "/huur/2"],
            Some("/huren/page-2"),
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/huren/page-2"))
        .respond_with(html(anchor_page(&["/huur/3"], None)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zoeken"))
        .and(ExactQuery(Some("area=amsterdam")))
        .respond_with(html(json_page(&["https://f.example/1"])))
        .mount(server)
        .await;
}

fn searches(uri: &str) -> String {
    format!(
        r#"
[[search]]
url = "{uri}/huren"
mode = "rent"

[[search]]
url = "{uri}/zoeken?area=amsterdam"
mode = "buy"
"#,
        uri = uri
    )
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("listings.db").to_string_lossy().into_owned()
}

fn open(path: &str) -> SqliteStore {
    SqliteStore::new(Path::new(path)).unwrap()
}

#[tokio::test]
async fn test_run_reports_only_net_new_listings() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_sites(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);

    // Seen on an earlier run
    let mut store = open(&db);
    let known: BTreeSet<String> = [format!("{}/huur/1", uri)].into_iter().collect();
    store
        .append(&known, &format!("{}/huren", uri), "earlier-run", 1)
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let config = watch_config(&uri, &db, &searches(&uri));
    let mut coordinator = Coordinator::new(config, store, Vec::new())
        .with_notifier(notifier.clone())
        .with_config_hash("test-hash");

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.net_new, 3);
    assert_eq!(summary.notified, 3);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages.contains(&format!("New listing: \n{}/huur/2", uri)));
    assert!(messages.contains(&format!("New listing: \n{}/huur/3", uri)));
    assert!(messages.contains(&"New listing: \nhttps://f.example/1".to_string()));
    assert!(!messages.iter().any(|m| m.ends_with("/huur/1")));

    let stored = coordinator.store().known_urls().unwrap();
    assert_eq!(stored.len(), 4);

    let run = coordinator
        .store()
        .get_run(coordinator.run_uuid())
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.net_new, 3);
    assert_eq!(run.config_hash, "test-hash");
}

#[tokio::test]
async fn test_second_run_finds_nothing_new() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_sites(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);

    let first = Arc::new(RecordingNotifier::default());
    let mut coordinator = Coordinator::new(
        watch_config(&uri, &db, &searches(&uri)),
        open(&db),
        Vec::new(),
    )
    .with_notifier(first.clone());
    coordinator.run().await.unwrap();
    assert_eq!(first.messages().len(), 4);

    let second = Arc::new(RecordingNotifier::default());
    let mut coordinator = Coordinator::new(
        watch_config(&uri, &db, &searches(&uri)),
        open(&db),
        Vec::new(),
    )
    .with_notifier(second.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.net_new, 0);
    assert!(second.messages().is_empty());
}

#[tokio::test]
async fn test_shadow_run_stores_without_notifying() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_sites(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);

    let notifier = Arc::new(RecordingNotifier::default());
    let mut coordinator = Coordinator::new(
        watch_config(&uri, &db, &searches(&uri)),
        open(&db),
        Vec::new(),
    )
    .with_notifier(notifier.clone())
    .with_shadow(true);

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.net_new, 4);
    assert_eq!(summary.notified, 0);
    assert!(notifier.messages().is_empty());
    assert_eq!(coordinator.store().known_urls().unwrap().len(), 4);
}

#[tokio::test]
async fn test_failed_and_unmatched_searches_do_not_stop_run() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_sites(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);

    let extra = format!(
        r#"
[[search]]
url = "{uri}/huren/gone"
mode = "rent"

[[search]]
url = "https://elsewhere.example/search"
mode = "rent"

[[search]]
url = "{uri}/zoeken?area=amsterdam"
mode = "rent"
"#,
        uri = uri
    );

    let mut coordinator = Coordinator::new(watch_config(&uri, &db, &extra), open(&db), Vec::new());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.net_new, 1);
}

#[tokio::test]
async fn test_sites_requiring_proxies_are_skipped_without_them() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/huren"))
        .respond_with(html(anchor_page(&["/huur/1"], None)))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);

    let extra = format!(
        r#"
[[search]]
url = "{uri}/huren"
mode = "rent"
"#,
        uri = uri
    );
    let mut config = watch_config(&uri, &db, &extra);
    config.sites[0].use_proxies = true;
    config.sites[0].require_proxies = true;

    let mut coordinator = Coordinator::new(config, open(&db), Vec::new());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 0);
}

#[tokio::test]
async fn test_cancelled_run_is_marked_failed() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_sites(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = db_path(&dir);

    let mut coordinator = Coordinator::new(
        watch_config(&uri, &db, &searches(&uri)),
        open(&db),
        Vec::new(),
    );
    coordinator.cancel_token().cancel();

    let err = coordinator.run().await.unwrap_err();
    assert!(err.is_run_fatal());

    let run = coordinator
        .store()
        .get_run(coordinator.run_uuid())
        .unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(coordinator.store().known_urls().unwrap().is_empty());
}
