//! Post-hoc validation of a stored snapshot's root page.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::constants::{ASSETS_DIR, INDEX_FILE};
use crate::fs_utils::count_files;
use crate::rewrite::banner::{BANNER_MARKER, FALLBACK_ENTRY};
use crate::store::AssetCategory;

static BASE: Lazy<Selector> = Lazy::new(|| Selector::parse("base[href]").expect("valid selector"));
static STYLESHEET_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="stylesheet"][href]"#).expect("valid selector"));
static EXTERNAL_SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[src]").expect("valid selector"));
static IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src], img[srcset], picture source").expect("valid selector"));
static URL_BEARING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[href], [src]").expect("valid selector"));
static NOSCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("noscript").expect("valid selector"));

const MAX_REPORTED_URLS: usize = 20;

/// Markers of a client-side loading screen that may never clear offline.
const LOADING_MARKERS: &[&str] = &["loading-screen", "page-loader", "preloader", "splash-screen"];

/// Hydration and validation report for one snapshot.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub has_base_tag: bool,
    pub has_offline_banner: bool,
    pub has_fallback_script: bool,
    pub has_css_links: bool,
    pub has_js_scripts: bool,
    pub has_images: bool,
    pub absolute_urls: Vec<String>,
    pub absolute_url_count: usize,
    pub asset_counts: BTreeMap<String, usize>,
    pub countermeasures: Vec<String>,
    pub warnings: Vec<String>,
    pub frameworks: Vec<String>,
}

/// Inspect the snapshot stored in `snapshot_dir`.
///
/// Returns `Ok(None)` when the directory holds no root page.
///
/// # Errors
///
/// Returns an error if the root page or asset directories cannot be read.
pub async fn inspect_snapshot(snapshot_dir: &Path) -> anyhow::Result<Option<InspectionReport>> {
    let index = snapshot_dir.join(INDEX_FILE);
    let markup = match tokio::fs::read_to_string(&index).await {
        Ok(markup) => markup,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", index.display()));
        }
    };

    let mut asset_counts = BTreeMap::new();
    for category in AssetCategory::ALL {
        let dir = snapshot_dir.join(ASSETS_DIR).join(category.dir_name());
        asset_counts.insert(category.dir_name().to_string(), count_files(&dir).await?);
    }

    Ok(Some(inspect_markup(&markup, asset_counts)))
}

/// Build a report from root-page markup and per-category file counts.
#[must_use]
pub fn inspect_markup(markup: &str, asset_counts: BTreeMap<String, usize>) -> InspectionReport {
    let document = Html::parse_document(markup);
    let count = |category: AssetCategory| {
        asset_counts
            .get(category.dir_name())
            .copied()
            .unwrap_or_default()
    };

    // A stylesheet link only counts if something was actually stored for it
    let has_css_links =
        document.select(&STYLESHEET_LINK).next().is_some() && count(AssetCategory::Style) > 0;

    let absolute: Vec<String> = document
        .select(&URL_BEARING)
        .filter(|el| el.value().name() != "a")
        .flat_map(|el| ["href", "src"].into_iter().filter_map(move |a| el.value().attr(a)))
        .filter(|v| v.starts_with("http://") || v.starts_with("https://") || v.starts_with("//"))
        .map(str::to_string)
        .collect();

    let lower = markup.to_ascii_lowercase();

    let mut countermeasures = Vec::new();
    if lower.contains("cf-browser-verification")
        || lower.contains("challenges.cloudflare.com")
        || lower.contains("cf_chl_")
    {
        countermeasures.push("cloudflare".to_string());
    }
    if lower.contains("recaptcha") || lower.contains("g-recaptcha") {
        countermeasures.push("recaptcha".to_string());
    }

    let mut warnings = Vec::new();
    if LOADING_MARKERS.iter().any(|m| lower.contains(m)) {
        warnings.push("page contains a loading screen that may not clear offline".to_string());
    }
    if document.select(&NOSCRIPT).next().is_some() {
        warnings.push("page has noscript content; it may depend on JavaScript to render".to_string());
    }

    let mut frameworks = Vec::new();
    if markup.contains("__NEXT_DATA__") || markup.contains("/_next/") {
        frameworks.push("next.js".to_string());
    }
    if markup.contains("data-reactroot") || markup.contains("__REACT_DEVTOOLS") {
        frameworks.push("react".to_string());
    }
    if markup.contains("__NUXT__") {
        frameworks.push("nuxt".to_string());
    }

    InspectionReport {
        has_base_tag: document.select(&BASE).next().is_some(),
        has_offline_banner: markup.contains(BANNER_MARKER),
        has_fallback_script: markup.contains(FALLBACK_ENTRY),
        has_css_links,
        has_js_scripts: document.select(&EXTERNAL_SCRIPT).next().is_some(),
        has_images: document.select(&IMAGE).next().is_some(),
        absolute_url_count: absolute.len(),
        absolute_urls: absolute.into_iter().take(MAX_REPORTED_URLS).collect(),
        asset_counts,
        countermeasures,
        warnings,
        frameworks,
    }
}
