//! End-to-end snapshot tests driven through a scripted visitor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{engine, test_config, FakePage, FakeVisitor};
use offline_snapshot::capture::{BlockKind, CaptureError, ObservedResponse, ResourceBuffer};
use offline_snapshot::config::SnapshotPolicy;
use offline_snapshot::normalize::{asset_id, snapshot_id};
use offline_snapshot::snapshot::{SnapshotEngine, SnapshotError, SnapshotRequest};
use offline_snapshot::store::Manifest;
use tempfile::TempDir;

fn request(url: &str, max_depth: Option<u32>) -> SnapshotRequest {
    SnapshotRequest {
        url: url.to_string(),
        max_depth,
        cookies: Vec::new(),
    }
}

const ROOT_WITH_CSS: &str = r#"<!DOCTYPE html><html><head><title>Example</title><link rel="stylesheet" href="https://example.com/style.css"></head><body><h1>Hello</h1></body></html>"#;

#[tokio::test]
async fn test_single_page_with_stylesheet() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(FakeVisitor::new().page(
        "https://example.com/",
        FakePage::new("https://example.com/", ROOT_WITH_CSS).with_resource(
            "https://example.com/style.css",
            "text/css",
            "body { color: red; }",
        ),
    ));
    let engine = engine(test_config(tmp.path()), Arc::clone(&visitor));

    let summary = engine
        .snapshot(request("https://example.com/", Some(0)))
        .await
        .unwrap();

    assert_eq!(summary.cache_hash, snapshot_id("https://example.com"));
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.assets, 1);
    assert!(summary.errors.is_empty());

    let dir = tmp.path().join(&summary.cache_hash);
    let manifest = Manifest::read(&dir).await.unwrap().unwrap();
    assert_eq!(manifest.pages[0].local_path, "index.html");
    assert_eq!(manifest.pages[0].depth, 0);

    let css_path = format!("assets/styles/{}.css", asset_id("https://example.com/style.css"));
    assert_eq!(manifest.assets[0].local_path, css_path);
    assert_eq!(manifest.assets[0].size, 20);
    assert!(dir.join(&css_path).exists());

    let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(index.contains(&format!(r#"href="./{css_path}""#)));
    assert!(!index.contains("https://example.com/style.css"));
    assert!(index.contains(r#"<base href="./">"#));
    assert!(index.contains("Cached Content - Viewing Offline Snapshot"));

    // Nothing is left behind in the cache root besides the snapshot itself
    let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_forbidden_root_fails_without_persisting() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(
        FakeVisitor::new().failing(
            "https://example.com/",
            CaptureError::Blocked(BlockKind::Forbidden),
        ),
    );
    let engine = engine(test_config(tmp.path()), visitor);

    let err = engine
        .snapshot(request("https://example.com/", None))
        .await
        .unwrap_err();

    assert!(err.is_blocked());
    let message = err.to_string();
    assert!(message.contains("anti-bot protection"), "{message}");
    assert!(message.contains("forbidden"), "{message}");

    let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_plain_navigation_failure_reports_no_content() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(FakeVisitor::new().failing(
        "https://example.com/",
        CaptureError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()),
    ));
    let engine = engine(test_config(tmp.path()), visitor);

    let err = engine
        .snapshot(request("https://example.com", None))
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::NoContent { .. }));
    assert!(err.to_string().starts_with("no content was saved"));
}

fn linked_site() -> FakeVisitor {
    let root = r#"<html><head></head><body><a href="/a">A</a><a href="/b/">B</a><a href="https://other.com/">Out</a></body></html>"#;
    let a = r#"<html><head></head><body><a href="/">Home</a><a href="/b">B</a><a href="/deep">Deep</a><img src="/logo.png"></body></html>"#;
    let b = r#"<html><head></head><body><a href="/a#top">A</a><img src="https://example.com/logo.png"></body></html>"#;
    FakeVisitor::new()
        .page("https://example.com/", FakePage::new("https://example.com/", root))
        .page(
            "https://example.com/a",
            FakePage::new("https://example.com/a", a).with_resource(
                "https://example.com/logo.png",
                "image/png",
                "png",
            ),
        )
        .page(
            "https://example.com/b",
            FakePage::new("https://example.com/b", b).with_resource(
                "https://example.com/logo.png",
                "image/png",
                "png",
            ),
        )
        .page(
            "https://example.com/deep",
            FakePage::new("https://example.com/deep", "<html><body>deep</body></html>"),
        )
}

#[tokio::test]
async fn test_depth_zero_visits_only_root() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(linked_site());
    let engine = engine(test_config(tmp.path()), Arc::clone(&visitor));

    let summary = engine
        .snapshot(request("https://example.com/", Some(0)))
        .await
        .unwrap();
    assert_eq!(summary.pages, 1);
    assert_eq!(visitor.visits(), vec!["https://example.com".to_string()]);
}

#[tokio::test]
async fn test_cross_page_links_are_rewritten() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(linked_site());
    let engine = engine(test_config(tmp.path()), Arc::clone(&visitor));

    let summary = engine
        .snapshot(request("https://example.com/", Some(1)))
        .await
        .unwrap();

    // Root plus the two depth-1 pages; /deep sits at depth 2
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.assets, 1);
    assert_eq!(
        visitor.visits(),
        vec![
            "https://example.com".to_string(),
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ]
    );

    let dir = tmp.path().join(&summary.cache_hash);
    let page_a = format!("pages/page_{}.html", asset_id("https://example.com/a"));
    let page_b = format!("pages/page_{}.html", asset_id("https://example.com/b"));
    let logo = format!("assets/images/{}.png", asset_id("https://example.com/logo.png"));

    let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(index.contains(&format!(r#"href="./{page_a}""#)));
    assert!(index.contains(&format!(r#"href="./{page_b}""#)));
    assert!(index.contains(r#"href="https://other.com/""#));

    let a = std::fs::read_to_string(dir.join(&page_a)).unwrap();
    assert!(a.contains(r#"href="../index.html""#));
    assert!(a.contains(&format!(r#"href="../{page_b}""#)));
    assert!(a.contains(&format!(r#"src="../{logo}""#)));
    // Not captured, so left pointing at the live site
    assert!(a.contains(r#"href="/deep""#));

    // Page b was rewritten after a, but still links back to it
    let b = std::fs::read_to_string(dir.join(&page_b)).unwrap();
    assert!(b.contains(&format!(r#"href="../{page_a}#top""#)));
    assert!(b.contains(&format!(r#"src="../{logo}""#)));
}

#[tokio::test]
async fn test_crawled_page_wins_over_prefetched_copy() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(
        FakeVisitor::new()
            .page(
                "https://example.com/",
                FakePage::new(
                    "https://example.com/",
                    r#"<html><body><a href="/about">About</a></body></html>"#,
                )
                .with_resource(
                    "https://example.com/about",
                    "text/html",
                    "<html><body>prefetched</body></html>",
                ),
            )
            .page(
                "https://example.com/about",
                FakePage::new(
                    "https://example.com/about",
                    r#"<html><body><a href="/">Home</a></body></html>"#,
                ),
            ),
    );
    let engine = engine(test_config(tmp.path()), Arc::clone(&visitor));

    let summary = engine
        .snapshot(request("https://example.com/", Some(1)))
        .await
        .unwrap();
    assert_eq!(summary.pages, 2);

    let dir = tmp.path().join(&summary.cache_hash);
    let about = format!("pages/page_{}.html", asset_id("https://example.com/about"));
    let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(index.contains(&format!(r#"href="./{about}""#)), "{index}");
    assert!(!index.contains("./assets/"));

    let about_html = std::fs::read_to_string(dir.join(&about)).unwrap();
    assert!(about_html.contains(r#"href="../index.html""#));
}

#[tokio::test]
async fn test_failed_subpage_is_partial_success() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(
        linked_site().failing("https://example.com/b", CaptureError::HttpStatus(500)),
    );
    let engine = engine(test_config(tmp.path()), visitor);

    let summary = engine
        .snapshot(request("https://example.com/", Some(1)))
        .await
        .unwrap();
    assert_eq!(summary.pages, 2);
    assert!(summary.is_partial());
    assert_eq!(summary.errors[0].url, "https://example.com/b");
    assert_eq!(summary.errors[0].error, "HTTP 500 error");

    let manifest = Manifest::read(&tmp.path().join(&summary.cache_hash))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manifest.errors.len(), 1);
}

#[tokio::test]
async fn test_no_mapped_url_left_in_root_attributes() {
    let tmp = TempDir::new().unwrap();
    let markup = r#"<html><head><link rel="stylesheet" href="https://example.com/css/site.css"><script src="https://example.com/js/app.js"></script></head><body><img src="https://cdn.example.net/hero.webp" srcset="https://cdn.example.net/hero.webp 1x"><a href="https://example.com/">self</a></body></html>"#;
    let visitor = Arc::new(
        FakeVisitor::new().page(
            "https://example.com/",
            FakePage::new("https://example.com/", markup)
                .with_resource("https://example.com/css/site.css", "text/css", "a{}")
                .with_resource(
                    "https://example.com/js/app.js",
                    "application/javascript",
                    "1",
                )
                .with_resource("https://cdn.example.net/hero.webp", "image/webp", "w"),
        ),
    );
    let engine = engine(test_config(tmp.path()), visitor);

    let summary = engine
        .snapshot(request("https://example.com/", None))
        .await
        .unwrap();
    let dir = tmp.path().join(&summary.cache_hash);
    let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
    let manifest = Manifest::read(&dir).await.unwrap().unwrap();

    for asset in &manifest.assets {
        for attr in ["href", "src", "srcset"] {
            let live = format!(r#"{attr}="{}"#, asset.original_url);
            assert!(!index.contains(&live), "{live} survived rewriting");
        }
    }
    assert!(index.contains(r#"href="./index.html""#));
}

#[tokio::test]
async fn test_stylesheet_urls_point_at_local_assets() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(
        FakeVisitor::new().page(
            "https://example.com/",
            FakePage::new("https://example.com/", ROOT_WITH_CSS)
                .with_resource(
                    "https://example.com/style.css",
                    "text/css",
                    "h1 { background: url('/img/bg.png'); }",
                )
                .with_resource("https://example.com/img/bg.png", "image/png", "png"),
        ),
    );
    let engine = engine(test_config(tmp.path()), visitor);

    let summary = engine
        .snapshot(request("https://example.com/", None))
        .await
        .unwrap();
    let dir = tmp.path().join(&summary.cache_hash);
    let css = std::fs::read_to_string(dir.join(format!(
        "assets/styles/{}.css",
        asset_id("https://example.com/style.css")
    )))
    .unwrap();
    let bg = asset_id("https://example.com/img/bg.png");
    assert!(css.contains(&format!("url('../../assets/images/{bg}.png')")), "{css}");
}

#[tokio::test]
async fn test_error_responses_never_become_assets() {
    let mut buffer = ResourceBuffer::new();
    let respond = |url: &str, status: u16, is_document: bool| ObservedResponse {
        request_id: url.to_string(),
        url: url.to_string(),
        status,
        mime_type: Some("image/png".to_string()),
        is_document,
    };

    buffer.observe(respond("https://example.com/", 200, true));
    buffer.observe(respond("https://example.com/ok.png", 200, false));
    buffer.observe(respond("https://example.com/missing.png", 404, false));
    buffer.observe(respond("https://example.com/broken.png", 500, false));

    let kept: Vec<_> = buffer.drain().into_iter().map(|r| r.url).collect();
    assert_eq!(kept, vec!["https://example.com/ok.png".to_string()]);
    assert_eq!(buffer.skipped_errors(), 2);
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_browser() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(FakeVisitor::new());
    let engine = engine(test_config(tmp.path()), Arc::clone(&visitor));

    for url in ["", "chrome://settings", "ftp://example.com/x", "not a url"] {
        let err = engine.snapshot(request(url, None)).await.unwrap_err();
        assert!(err.is_input(), "{url}: {err}");
    }
    assert!(visitor.visits().is_empty());
}

#[tokio::test]
async fn test_trailing_slash_variants_share_a_snapshot() {
    assert_eq!(
        SnapshotEngine::cache_hash_for("https://example.com/docs/"),
        SnapshotEngine::cache_hash_for("https://example.com/docs")
    );
}

#[tokio::test]
async fn test_reuse_policy_skips_recapture() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(FakeVisitor::new().page(
        "https://example.com/",
        FakePage::new("https://example.com/", ROOT_WITH_CSS),
    ));
    let mut config = test_config(tmp.path());
    config.snapshot_policy = SnapshotPolicy::Reuse;
    let engine = engine(config, Arc::clone(&visitor));

    let first = engine
        .snapshot(request("https://example.com/", None))
        .await
        .unwrap();
    let second = engine
        .snapshot(request("https://example.com", None))
        .await
        .unwrap();

    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(first.cache_hash, second.cache_hash);
    assert_eq!(visitor.visits().len(), 1);
}

#[tokio::test]
async fn test_overwrite_policy_recaptures() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(FakeVisitor::new().page(
        "https://example.com/",
        FakePage::new("https://example.com/", ROOT_WITH_CSS),
    ));
    let engine = engine(test_config(tmp.path()), Arc::clone(&visitor));

    engine
        .snapshot(request("https://example.com/", None))
        .await
        .unwrap();
    engine
        .snapshot(request("https://example.com/", None))
        .await
        .unwrap();
    assert_eq!(visitor.visits().len(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_crawl() {
    let tmp = TempDir::new().unwrap();
    let visitor = Arc::new(
        FakeVisitor::new()
            .page(
                "https://example.com/",
                FakePage::new("https://example.com/", ROOT_WITH_CSS),
            )
            .with_delay(Duration::from_millis(100)),
    );
    let engine = Arc::new(engine(test_config(tmp.path()), Arc::clone(&visitor)));

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.snapshot(request("https://example.com/", None)).await })
    };
    let second = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.snapshot(request("https://example.com", None)).await })
    };

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.cache_hash, second.cache_hash);
    assert_eq!(visitor.visits().len(), 1);
}
