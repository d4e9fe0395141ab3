use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use super::engine::{SnapshotEngine, SnapshotRequest, SnapshotSummary};

/// Several independent root URLs captured under one concurrency limit.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    pub max_depth: Option<u32>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub url: String,
    pub error: String,
    pub blocked: bool,
}

/// Aggregated per-URL outcomes, in request order within each list.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub successful: Vec<SnapshotSummary>,
    pub failed: Vec<BatchFailure>,
}

impl SnapshotEngine {
    /// Capture every URL in `request`, at most `concurrency` at a time.
    ///
    /// URLs are processed in fixed-size groups. Within a group each start is
    /// offset slightly so browser contexts are not all created at once. A
    /// failing URL is reported and never stops the rest of the batch.
    pub async fn snapshot_batch(&self, request: BatchRequest) -> BatchReport {
        let group_size = self.config().effective_concurrency(request.concurrency);
        let stagger = self.config().batch_stagger;
        let mut report = BatchReport {
            total: request.urls.len(),
            ..BatchReport::default()
        };

        info!(
            urls = report.total,
            concurrency = group_size,
            max_depth = ?request.max_depth,
            "Starting batch"
        );

        for (group_index, group) in request.urls.chunks(group_size).enumerate() {
            let jobs = group.iter().enumerate().map(|(i, url)| {
                let delay = stagger_delay(stagger, i);
                let snapshot = SnapshotRequest {
                    url: url.clone(),
                    max_depth: request.max_depth,
                    cookies: Vec::new(),
                };
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (snapshot.url.clone(), self.snapshot(snapshot).await)
                }
            });

            for (url, outcome) in join_all(jobs).await {
                match outcome {
                    Ok(summary) => report.successful.push(summary),
                    Err(e) => {
                        warn!(url = %url, group = group_index, error = %e, "Batch entry failed");
                        report.failed.push(BatchFailure {
                            url,
                            blocked: e.is_blocked(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            total = report.total,
            successful = report.successful.len(),
            failed = report.failed.len(),
            "Batch complete"
        );
        report
    }
}

/// Start offset for the `index`th member of a group, with a little jitter.
fn stagger_delay(stagger: Duration, index: usize) -> Duration {
    if stagger.is_zero() {
        return Duration::ZERO;
    }
    let base = stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
    let jitter_ms = rand::thread_rng().gen_range(0..=stagger.as_millis().min(100) as u64);
    base + Duration::from_millis(jitter_ms)
}
