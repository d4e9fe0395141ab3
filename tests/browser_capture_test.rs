//! Live capture through headless Chromium.
//!
//! Needs a local Chrome/Chromium and network access:
//! `cargo test --test browser_capture_test -- --ignored`

use std::sync::Arc;

use offline_snapshot::capture::{ChromiumVisitor, PageVisitor, VisitRequest};
use offline_snapshot::config::Config;
use offline_snapshot::snapshot::{SnapshotEngine, SnapshotRequest};
use tempfile::TempDir;

#[tokio::test]
#[ignore = "requires Chromium and network access"]
async fn test_visit_example_dot_com() {
    let config = Arc::new(Config::for_testing());
    let visitor = ChromiumVisitor::new(Arc::clone(&config));

    let capture = visitor
        .visit(&VisitRequest {
            url: "https://example.com".to_string(),
            depth: 0,
            cookies: Vec::new(),
        })
        .await
        .unwrap();
    visitor.shutdown().await;

    assert!(capture.final_url.starts_with("https://example.com"));
    assert!(capture.markup.contains("Example Domain"));
}

#[tokio::test]
#[ignore = "requires Chromium and network access"]
async fn test_snapshot_example_dot_com() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::for_testing();
    config.cache_dir = tmp.path().to_path_buf();
    let config = Arc::new(config);

    let visitor: Arc<dyn PageVisitor> = Arc::new(ChromiumVisitor::new(Arc::clone(&config)));
    let engine = SnapshotEngine::new(config, visitor);

    let summary = engine
        .snapshot(SnapshotRequest {
            url: "https://example.com/".to_string(),
            max_depth: Some(0),
            cookies: Vec::new(),
        })
        .await
        .unwrap();
    engine.shutdown().await;

    assert_eq!(summary.pages, 1);
    let index = tmp.path().join(&summary.cache_hash).join("index.html");
    let html = std::fs::read_to_string(index).unwrap();
    assert!(html.contains(r#"<base href="./">"#));
}
