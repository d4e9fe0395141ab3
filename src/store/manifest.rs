use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MANIFEST_FILE;

/// A page captured into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub local_path: String,
    pub depth: u32,
}

/// A network resource persisted into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub original_url: String,
    pub local_path: String,
    pub content_type: Option<String>,
    pub size: u64,
}

/// A page that could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub url: String,
    pub error: String,
}

/// The `manifest.json` written at the root of every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub url: String,
    pub cache_hash: String,
    pub cached_at: DateTime<Utc>,
    pub pages: Vec<PageRecord>,
    pub assets: Vec<AssetRecord>,
    #[serde(default)]
    pub errors: Vec<PageError>,
}

impl Manifest {
    /// Total bytes across all persisted assets.
    #[must_use]
    pub fn asset_bytes(&self) -> u64 {
        self.assets.iter().map(|a| a.size).sum()
    }

    /// Write the manifest into `snapshot_dir`.
    pub async fn write(&self, snapshot_dir: &Path) -> Result<()> {
        let path = snapshot_dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize manifest")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }

    /// Read the manifest from `snapshot_dir`, returning `None` if absent.
    pub async fn read(snapshot_dir: &Path) -> Result<Option<Self>> {
        let path = snapshot_dir.join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .context(format!("Failed to read manifest: {}", path.display()))
            }
        };
        let manifest = serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed manifest: {}", path.display()))?;
        Ok(Some(manifest))
    }
}
