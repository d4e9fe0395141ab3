//! Scripted page visitor shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use offline_snapshot::capture::{
    CaptureError, CapturedResource, PageCapture, PageVisitor, VisitRequest,
};
use offline_snapshot::config::Config;
use offline_snapshot::normalize::normalize_url;
use offline_snapshot::snapshot::SnapshotEngine;

/// A page the fake browser will "render".
#[derive(Clone)]
pub struct FakePage {
    pub final_url: String,
    pub markup: String,
    pub resources: Vec<CapturedResource>,
}

impl FakePage {
    pub fn new(final_url: &str, markup: &str) -> Self {
        Self {
            final_url: final_url.to_string(),
            markup: markup.to_string(),
            resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, url: &str, content_type: &str, body: &str) -> Self {
        self.resources.push(CapturedResource {
            url: url.to_string(),
            content_type: Some(content_type.to_string()),
            body: body.as_bytes().to_vec(),
        });
        self
    }
}

/// Visitor that answers from a fixed table keyed by normalized URL.
#[derive(Default)]
pub struct FakeVisitor {
    pages: HashMap<String, Result<FakePage, CaptureError>>,
    delay: Duration,
    visits: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(normalize_url(url), Ok(page));
        self
    }

    pub fn failing(mut self, url: &str, error: CaptureError) -> Self {
        self.pages.insert(normalize_url(url), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    /// Highest number of visits that were in progress at the same time.
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageVisitor for FakeVisitor {
    async fn visit(&self, request: &VisitRequest) -> Result<PageCapture, CaptureError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.visits.lock().unwrap().push(request.url.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match self.pages.get(&normalize_url(&request.url)) {
            Some(Ok(page)) => Ok(PageCapture {
                final_url: page.final_url.clone(),
                markup: page.markup.clone(),
                depth: request.depth,
                resources: page.resources.clone(),
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(CaptureError::HttpStatus(404)),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Test config rooted at `cache_dir`.
pub fn test_config(cache_dir: &Path) -> Config {
    let mut config = Config::for_testing();
    config.cache_dir = cache_dir.to_path_buf();
    config
}

pub fn engine(config: Config, visitor: Arc<FakeVisitor>) -> SnapshotEngine {
    SnapshotEngine::new(Arc::new(config), visitor)
}
