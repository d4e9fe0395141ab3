use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::classify::classify;
use super::manifest::AssetRecord;
use super::mapping::UrlMapping;
use crate::capture::CapturedResource;
use crate::constants::ASSETS_DIR;
use crate::normalize::asset_id;

/// Writes captured resources into a snapshot's category-partitioned asset tree.
#[derive(Debug)]
pub struct AssetStore {
    snapshot_dir: PathBuf,
    mapping: UrlMapping,
    records: Vec<AssetRecord>,
}

impl AssetStore {
    #[must_use]
    pub fn new(snapshot_dir: &Path) -> Self {
        Self {
            snapshot_dir: snapshot_dir.to_path_buf(),
            mapping: UrlMapping::new(),
            records: Vec::new(),
        }
    }

    /// Persist one resource, returning its record if it was newly written.
    ///
    /// URLs already recorded are skipped. A failed write is logged and the
    /// resource is left unmapped so the page keeps its live reference.
    pub async fn persist(&mut self, resource: &CapturedResource) -> Option<AssetRecord> {
        if self.mapping.contains(&resource.url) {
            return None;
        }

        let (category, ext) = classify(resource.content_type.as_deref(), &resource.url);
        let file_name = format!("{}{ext}", asset_id(&resource.url));
        let local_path = format!("{ASSETS_DIR}/{}/{file_name}", category.dir_name());
        let full_path = self.snapshot_dir.join(&local_path);

        if let Err(e) = tokio::fs::write(&full_path, &resource.body).await {
            warn!(
                url = %resource.url,
                path = %full_path.display(),
                error = %e,
                "Failed to write asset, skipping"
            );
            return None;
        }

        debug!(
            url = %resource.url,
            path = %local_path,
            bytes = resource.body.len(),
            "Persisted asset"
        );

        let record = AssetRecord {
            original_url: resource.url.clone(),
            local_path: local_path.clone(),
            content_type: resource.content_type.clone(),
            size: resource.body.len() as u64,
        };
        self.mapping.insert_asset(resource.url.clone(), local_path);
        self.records.push(record.clone());
        Some(record)
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.mapping.contains(url)
    }

    #[must_use]
    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    /// Consume the store, yielding the asset mapping and records.
    #[must_use]
    pub fn into_parts(self) -> (UrlMapping, Vec<AssetRecord>) {
        (self.mapping, self.records)
    }
}
