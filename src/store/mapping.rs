use std::collections::HashMap;

use crate::normalize::normalize_url;

/// Absolute URL to snapshot-relative local path.
///
/// Assets are inserted as they are persisted; pages are merged once the crawl
/// is over. A page path replaces an asset path recorded for the same URL.
#[derive(Debug, Clone, Default)]
pub struct UrlMapping {
    entries: HashMap<String, String>,
}

impl UrlMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_asset(&mut self, url: impl Into<String>, local_path: impl Into<String>) {
        self.entries.insert(url.into(), local_path.into());
    }

    /// Map a page URL to its rewritten page file.
    ///
    /// A crawled page wins over the raw asset copy of the same document.
    pub fn insert_page(&mut self, url: &str, local_path: &str) {
        self.entries.insert(url.to_string(), local_path.to_string());
    }

    /// Exact lookup without normalization.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Look up an absolute URL, falling back to its normalized form.
    ///
    /// The fallback lets `https://site/about/` find the page recorded as
    /// `https://site/about`, and ignores fragments on page links.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&str> {
        if let Some(path) = self.entries.get(url) {
            return Some(path.as_str());
        }
        let normalized = normalize_url(url);
        if normalized == url {
            return None;
        }
        self.entries.get(&normalized).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
