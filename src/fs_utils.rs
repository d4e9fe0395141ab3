use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use crate::constants::{ASSETS_DIR, PAGES_DIR};
use crate::store::AssetCategory;

/// Create the `pages/` and `assets/<category>/` tree under a snapshot root.
pub async fn ensure_snapshot_layout(snapshot_dir: &Path) -> Result<()> {
    let pages = snapshot_dir.join(PAGES_DIR);
    tokio::fs::create_dir_all(&pages)
        .await
        .with_context(|| format!("Failed to create pages directory: {}", pages.display()))?;

    for category in AssetCategory::ALL {
        let dir = snapshot_dir.join(ASSETS_DIR).join(category.dir_name());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create asset directory: {}", dir.display()))?;
    }

    Ok(())
}

/// Join a request path onto `root`, refusing anything that could escape it.
///
/// Only plain path segments are accepted: `..`, absolute paths, drive
/// prefixes and backslash separators all yield `None`.
#[must_use]
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.contains('\\') || relative.contains('\0') {
        return None;
    }

    let mut out = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Count regular files directly inside `dir`; a missing directory counts as empty.
pub async fn count_files(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(anyhow::Error::new(e))
                .context(format!("Failed to read directory: {}", dir.display()))
        }
    };

    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
