use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::input::{validate_target_url, InputError};
use super::inspect::{inspect_snapshot, InspectionReport};
use super::registry::InFlight;
use crate::capture::{AuthCookie, CaptureError, PageVisitor, VisitRequest};
use crate::config::{Config, SnapshotPolicy};
use crate::constants::{ASSETS_DIR, INDEX_FILE, PAGES_DIR};
use crate::crawl::CrawlFrontier;
use crate::fs_utils::ensure_snapshot_layout;
use crate::normalize::{asset_id, normalize_url, snapshot_id};
use crate::rewrite::{PathPrefix, Rewriter};
use crate::store::{AssetCategory, AssetRecord, AssetStore, Manifest, PageError, PageRecord};

/// Why a snapshot produced no output.
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("site has anti-bot protection ({reason}); use an alternate capture method such as manual caching or authentication cookies")]
    Blocked { url: String, reason: CaptureError },
    #[error("no content was saved: {reason}")]
    NoContent { url: String, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl SnapshotError {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl From<anyhow::Error> for SnapshotError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(format!("{e:#}"))
    }
}

/// What a caller asked to be captured.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRequest {
    pub url: String,
    pub max_depth: Option<u32>,
    pub cookies: Vec<AuthCookie>,
}

/// Result of a completed snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub cache_hash: String,
    pub url: String,
    pub pages: usize,
    pub assets: usize,
    pub errors: Vec<PageError>,
    /// True when the snapshot was served from disk without recapturing.
    pub reused: bool,
}

impl SnapshotSummary {
    fn from_manifest(manifest: &Manifest, reused: bool) -> Self {
        Self {
            cache_hash: manifest.cache_hash.clone(),
            url: manifest.url.clone(),
            pages: manifest.pages.len(),
            assets: manifest.assets.len(),
            errors: manifest.errors.clone(),
            reused,
        }
    }

    /// At least one page was captured but some failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub type SnapshotOutcome = Result<SnapshotSummary, SnapshotError>;

/// Lifecycle of one snapshot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    Idle,
    Crawling,
    Rewriting,
    Done,
    Failed,
}

/// A page captured during the crawl, held until the rewrite pass.
struct CapturedPage {
    url: String,
    final_url: String,
    depth: u32,
    local_path: String,
    markup: String,
}

/// Per-snapshot working state.
struct SnapshotRun {
    id: String,
    canonical: String,
    root: Url,
    max_depth: u32,
    staging_dir: PathBuf,
    phase: SnapshotPhase,
}

impl SnapshotRun {
    fn transition(&mut self, phase: SnapshotPhase) {
        debug!(cache_hash = %self.id, from = ?self.phase, to = ?phase, "Snapshot phase");
        self.phase = phase;
    }
}

/// Crawls, persists and rewrites snapshots.
pub struct SnapshotEngine {
    config: Arc<Config>,
    visitor: Arc<dyn PageVisitor>,
    in_flight: InFlight<SnapshotOutcome>,
}

impl SnapshotEngine {
    #[must_use]
    pub fn new(config: Arc<Config>, visitor: Arc<dyn PageVisitor>) -> Self {
        Self {
            config,
            visitor,
            in_flight: InFlight::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory a snapshot id lives in.
    #[must_use]
    pub fn snapshot_dir(&self, cache_hash: &str) -> PathBuf {
        self.config.cache_dir.join(cache_hash)
    }

    /// Snapshot id a URL would be stored under, after normalization.
    #[must_use]
    pub fn cache_hash_for(url: &str) -> String {
        snapshot_id(&normalize_url(url))
    }

    /// Capture `request.url` and everything reachable within the depth limit.
    ///
    /// Concurrent requests for the same normalized URL share one run.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Input`] before any browser work for bad
    /// input, and a blocked or no-content error when no page was captured.
    pub async fn snapshot(&self, request: SnapshotRequest) -> SnapshotOutcome {
        let root = validate_target_url(&request.url)?;
        let canonical = normalize_url(root.as_str());
        let id = snapshot_id(&canonical);

        let job = self.run_snapshot(&id, &canonical, &root, &request);
        self.in_flight
            .run_or_join(&id, job)
            .await
            .unwrap_or_else(|| {
                Err(SnapshotError::Storage(
                    "concurrent snapshot was abandoned".to_string(),
                ))
            })
    }

    async fn run_snapshot(
        &self,
        id: &str,
        canonical: &str,
        root: &Url,
        request: &SnapshotRequest,
    ) -> SnapshotOutcome {
        let final_dir = self.snapshot_dir(id);

        if self.config.snapshot_policy == SnapshotPolicy::Reuse {
            if let Some(manifest) = Manifest::read(&final_dir).await? {
                info!(cache_hash = %id, url = %canonical, "Reusing existing snapshot");
                return Ok(SnapshotSummary::from_manifest(&manifest, true));
            }
        }

        let staging_dir = self.config.cache_dir.join(format!(
            ".staging-{id}-{:08x}",
            rand::thread_rng().gen::<u32>()
        ));
        let mut run = SnapshotRun {
            id: id.to_string(),
            canonical: canonical.to_string(),
            root: root.clone(),
            max_depth: self.config.effective_depth(request.max_depth),
            staging_dir,
            phase: SnapshotPhase::Idle,
        };

        let outcome = self.execute(&mut run, &request.cookies, &final_dir).await;

        if outcome.is_err() {
            run.transition(SnapshotPhase::Failed);
            if let Err(e) = tokio::fs::remove_dir_all(&run.staging_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %run.staging_dir.display(), "Failed to remove staging directory: {e}");
                }
            }
        }
        outcome
    }

    async fn execute(
        &self,
        run: &mut SnapshotRun,
        cookies: &[AuthCookie],
        final_dir: &Path,
    ) -> SnapshotOutcome {
        ensure_snapshot_layout(&run.staging_dir).await?;

        run.transition(SnapshotPhase::Crawling);
        info!(
            cache_hash = %run.id,
            url = %run.canonical,
            max_depth = run.max_depth,
            "Starting snapshot"
        );
        let (pages, store, errors, root_failure) = self.crawl(run, cookies).await;

        if pages.is_empty() {
            let reason = root_failure.unwrap_or_else(|| {
                CaptureError::Navigation("no page could be captured".to_string())
            });
            warn!(cache_hash = %run.id, url = %run.canonical, %reason, "Snapshot failed");
            return Err(if reason.is_blocked() {
                SnapshotError::Blocked {
                    url: run.canonical.clone(),
                    reason,
                }
            } else {
                SnapshotError::NoContent {
                    url: run.canonical.clone(),
                    reason: reason.to_string(),
                }
            });
        }

        run.transition(SnapshotPhase::Rewriting);
        let manifest = self.rewrite(run, pages, store, errors).await?;

        promote(&run.staging_dir, final_dir).await?;
        run.transition(SnapshotPhase::Done);

        info!(
            cache_hash = %run.id,
            url = %run.canonical,
            pages = manifest.pages.len(),
            assets = manifest.assets.len(),
            errors = manifest.errors.len(),
            "Snapshot complete"
        );
        Ok(SnapshotSummary::from_manifest(&manifest, false))
    }

    /// Drain the frontier, visiting pages one at a time in BFS order.
    async fn crawl(
        &self,
        run: &SnapshotRun,
        cookies: &[AuthCookie],
    ) -> (Vec<CapturedPage>, AssetStore, Vec<PageError>, Option<CaptureError>) {
        let mut frontier = CrawlFrontier::new(&run.root, run.max_depth);
        let mut store = AssetStore::new(&run.staging_dir);
        let mut pages: Vec<CapturedPage> = Vec::new();
        let mut errors = Vec::new();
        let mut root_failure = None;

        while let Some(entry) = frontier.dequeue() {
            let request = VisitRequest {
                url: entry.url.clone(),
                depth: entry.depth,
                cookies: cookies.to_vec(),
            };

            let capture = match self.visitor.visit(&request).await {
                Ok(capture) => capture,
                Err(e) => {
                    warn!(url = %entry.url, depth = entry.depth, error = %e, "Page capture failed");
                    errors.push(PageError {
                        url: entry.url.clone(),
                        error: e.to_string(),
                    });
                    if entry.depth == 0 {
                        root_failure = Some(e);
                    }
                    continue;
                }
            };

            let mut persisted = 0;
            for resource in &capture.resources {
                if store.persist(resource).await.is_some() {
                    persisted += 1;
                }
            }

            let local_path = if entry.depth == 0 {
                INDEX_FILE.to_string()
            } else {
                format!("{PAGES_DIR}/page_{}.html", asset_id(&entry.url))
            };

            frontier.enqueue_same_origin_links(&capture.final_url, &capture.markup, entry.depth);

            debug!(
                url = %entry.url,
                depth = entry.depth,
                path = %local_path,
                persisted,
                "Page stored"
            );

            pages.push(CapturedPage {
                url: entry.url,
                final_url: capture.final_url,
                depth: entry.depth,
                local_path,
                markup: capture.markup,
            });
        }

        (pages, store, errors, root_failure)
    }

    /// Build the full mapping, rewrite every page and stylesheet, write the manifest.
    async fn rewrite(
        &self,
        run: &SnapshotRun,
        pages: Vec<CapturedPage>,
        store: AssetStore,
        errors: Vec<PageError>,
    ) -> Result<Manifest, SnapshotError> {
        let (mut mapping, assets) = store.into_parts();
        for page in &pages {
            mapping.insert_page(&page.url, &page.local_path);
            if page.final_url != page.url {
                mapping.insert_page(&normalize_url(&page.final_url), &page.local_path);
            }
        }

        let rewriter = Rewriter::new(&mapping);
        for page in &pages {
            let prefix = if page.local_path == INDEX_FILE {
                PathPrefix::Root
            } else {
                PathPrefix::Page
            };
            let base = Url::parse(&page.final_url)
                .or_else(|_| Url::parse(&page.url))
                .unwrap_or_else(|_| run.root.clone());

            let html = match rewriter.rewrite_page(&page.markup, &base, prefix) {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %page.url, error = %e, "Rewrite failed, keeping captured markup");
                    page.markup.clone()
                }
            };

            let path = run.staging_dir.join(&page.local_path);
            tokio::fs::write(&path, html)
                .await
                .with_context(|| format!("Failed to write page: {}", path.display()))?;
        }

        rewrite_stylesheets(&rewriter, &run.staging_dir, &assets).await;

        let manifest = Manifest {
            url: run.canonical.clone(),
            cache_hash: run.id.clone(),
            cached_at: Utc::now(),
            pages: pages
                .iter()
                .map(|p| PageRecord {
                    url: p.url.clone(),
                    local_path: p.local_path.clone(),
                    depth: p.depth,
                })
                .collect(),
            assets,
            errors,
        };
        manifest.write(&run.staging_dir).await?;
        Ok(manifest)
    }

    /// Look up the stored snapshot for `url` without capturing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest exists but cannot be read.
    pub async fn check(&self, url: &str) -> anyhow::Result<(String, Option<Manifest>)> {
        let cache_hash = Self::cache_hash_for(url);
        let manifest = Manifest::read(&self.snapshot_dir(&cache_hash)).await?;
        Ok((cache_hash, manifest))
    }

    /// Root page markup and manifest of a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the files exist but cannot be read.
    pub async fn content(&self, cache_hash: &str) -> anyhow::Result<Option<(String, Manifest)>> {
        let dir = self.snapshot_dir(cache_hash);
        let Some(manifest) = Manifest::read(&dir).await? else {
            return Ok(None);
        };
        let index = dir.join(INDEX_FILE);
        let markup = match tokio::fs::read_to_string(&index).await {
            Ok(markup) => markup,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", index.display()))
            }
        };
        Ok(Some((markup, manifest)))
    }

    /// Hydration report for a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot files cannot be read.
    pub async fn inspect(&self, cache_hash: &str) -> anyhow::Result<Option<InspectionReport>> {
        inspect_snapshot(&self.snapshot_dir(cache_hash)).await
    }

    /// Release the browser.
    pub async fn shutdown(&self) {
        self.visitor.shutdown().await;
    }
}

/// Rewrite `url()` references inside persisted stylesheets in place.
async fn rewrite_stylesheets(
    rewriter: &Rewriter<'_>,
    staging_dir: &Path,
    assets: &[AssetRecord],
) {
    let styles_prefix = format!("{ASSETS_DIR}/{}/", AssetCategory::Style.dir_name());
    let mut rewritten_count = 0;
    for asset in assets.iter().filter(|a| a.local_path.starts_with(&styles_prefix)) {
        let Ok(sheet_url) = Url::parse(&asset.original_url) else {
            continue;
        };
        let path = staging_dir.join(&asset.local_path);
        let Ok(css) = tokio::fs::read_to_string(&path).await else {
            continue;
        };
        let rewritten = rewriter.rewrite_stylesheet(&css, &sheet_url);
        if rewritten != css {
            match tokio::fs::write(&path, rewritten).await {
                Ok(()) => rewritten_count += 1,
                Err(e) => warn!(path = %path.display(), "Failed to write rewritten stylesheet: {e}"),
            }
        }
    }
    debug!(rewritten = rewritten_count, "Stylesheets rewritten");
}

/// Replace any previous snapshot with the freshly built staging directory.
async fn promote(staging_dir: &Path, final_dir: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_dir_all(final_dir).await {
        Ok(()) => debug!(path = %final_dir.display(), "Replaced existing snapshot"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!(
                "Failed to remove previous snapshot: {}",
                final_dir.display()
            )))
        }
    }
    tokio::fs::rename(staging_dir, final_dir)
        .await
        .with_context(|| format!("Failed to move snapshot into {}", final_dir.display()))
}
