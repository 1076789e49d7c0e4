//! Liveness crawl against a local fixture server.
//!
//! Exercises the real `HttpProbe` (timeouts, status codes, refused
//! connections) and the persistence of results through `NavStore`.

use axum::{http::StatusCode, routing::get, Router};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use nav_server::models::{Dataset, Health};
use nav_server::paths::Paths;
use nav_server::settings::Settings;
use nav_server::spider::{spider_webs, HttpProbe, Probe};
use nav_server::store::{NavStore, Visibility};

// ─── Fixture ────────────────────────────────────────────────────────

async fn start_fixture() -> String {
    let app = Router::new()
        .route("/ok", get(|| async { "fine" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn dataset(base: &str) -> Dataset {
    serde_json::from_value(json!([
        {"id": 1, "title": "Links", "web": [
            {"id": 1, "name": "one", "url": format!("{}/ok", base)},
            {"id": 2, "name": "two", "url": format!("{}/ok?second", base)},
            {"id": 3, "name": "three", "url": format!("{}/slow", base)},
            {"id": 4, "name": "four", "url": format!("{}/ok?fourth", base)},
            {"id": 5, "name": "five", "url": format!("{}/ok?fifth", base)}
        ]}
    ]))
    .unwrap()
}

fn settings(qty: usize) -> Settings {
    Settings {
        spider_timeout: 1,
        spider_qty: qty,
        ..Default::default()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_timeout_is_isolated_to_its_entry() {
    let base = start_fixture().await;
    let probe = Arc::new(HttpProbe::new(Duration::from_millis(500)).unwrap());

    let mut reports = Vec::new();
    let outcome = spider_webs(dataset(&base), &settings(2), probe, |batch| {
        reports.extend(batch)
    })
    .await;

    assert_eq!(outcome.error_url_count, 1);
    assert_eq!(reports.len(), 5);
    let webs = &outcome.webs[0].web;
    assert_eq!(webs[2].health, Health::Timeout);
    for i in [0, 1, 3, 4] {
        assert_eq!(webs[i].health, Health::Ok { code: 200 }, "entry {}", i + 1);
    }
    // One slow entry must not serialize the crawl behind it.
    assert!(outcome.elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn test_http_errors_and_refused_connections_fail() {
    let base = start_fixture().await;
    let probe = HttpProbe::new(Duration::from_millis(500)).unwrap();

    match probe.probe(&format!("{}/missing", base)).await {
        Health::Failed { reason } => assert_eq!(reason, "HTTP 404"),
        other => panic!("expected failure, got {:?}", other),
    }

    // Bind then drop to get a port nothing listens on.
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let health = probe.probe(&format!("http://{}/", closed)).await;
    assert!(health.is_failure(), "got {:?}", health);
}

#[tokio::test]
async fn test_crawl_results_are_persisted() {
    let base = start_fixture().await;
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("data")).unwrap();
    let raw = serde_json::to_string(&dataset(&base)).unwrap();
    fs::write(root.join("data/server_db.json"), &raw).unwrap();
    fs::write(root.join("data/db.json"), &raw).unwrap();
    fs::write(
        root.join("data/settings.json"),
        r#"{"title":"Nav","spiderTimeout":1,"spiderQty":5,"theme":"Light"}"#,
    )
    .unwrap();

    let store = NavStore::new(Paths::new(root).unwrap());
    let mut settings = store.load_settings().await.unwrap();
    let webs = store.read_dataset(Visibility::Unfiltered).await.unwrap();
    let probe = Arc::new(HttpProbe::new(Duration::from_millis(500)).unwrap());
    let outcome = spider_webs(webs, &settings, probe, |_| {}).await;
    store.record_crawl(&outcome, &mut settings).await.unwrap();

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(root.join("data/settings.json")).unwrap())
            .unwrap();
    assert_eq!(saved["errorUrlCount"], 1);
    assert_eq!(saved["theme"], "Light");

    let server_copy = fs::read_to_string(root.join("data/server_db.json")).unwrap();
    assert_eq!(server_copy, fs::read_to_string(root.join("data/db.json")).unwrap());
    let written: Value = serde_json::from_str(&server_copy).unwrap();
    assert_eq!(written[0]["web"][2]["health"], json!({"status": "timeout"}));
    assert_eq!(written[0]["web"][0]["health"], json!({"status": "ok", "code": 200}));
}
