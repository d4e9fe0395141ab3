//! Second-pass URL rewriting that makes captured pages browsable offline.
//!
//! The rewriter only runs once the crawl is complete and the mapping holds
//! every page and asset of the snapshot. Page markup is rewritten
//! structurally: attribute values and `url()` nodes are looked up one at a
//! time, and inline scripts only have whole string literals replaced.

pub mod banner;
mod css;
mod html;
mod script;

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::normalize::path_component;
use crate::store::UrlMapping;

pub use css::rewrite_css;
pub use html::rewrite_html;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("html rewrite error: {0}")]
    Html(String),
    #[error("rewritten markup is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Where a rewritten document lives relative to the snapshot root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPrefix {
    /// `index.html` at the root.
    Root,
    /// A page under `pages/`.
    Page,
    /// A stylesheet under `assets/styles/`.
    Stylesheet,
}

impl PathPrefix {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "./",
            Self::Page => "../",
            Self::Stylesheet => "../../",
        }
    }
}

/// Values that are never resolved against the page URL.
const UNRESOLVABLE_PREFIXES: &[&str] = &["#", "data:", "blob:", "javascript:", "mailto:", "tel:", "about:"];

/// Resolves reference values found in one document to local paths.
#[derive(Debug)]
pub struct Resolver<'a> {
    mapping: &'a UrlMapping,
    base: &'a Url,
    prefix: PathPrefix,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(mapping: &'a UrlMapping, base: &'a Url, prefix: PathPrefix) -> Self {
        Self {
            mapping,
            base,
            prefix,
        }
    }

    /// Map a raw reference value to its prefixed local path.
    ///
    /// Absolute, protocol-relative, root-relative and relative values are all
    /// resolved against the document URL. HTML-encoded values are decoded
    /// first. A fragment on the original value is carried over.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        let lower = value.to_ascii_lowercase();
        if UNRESOLVABLE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return None;
        }

        if let Some(local) = self.mapping.get(value) {
            return Some(self.prefixed(local, None));
        }

        let decoded = decode_entities(value);
        let absolute = self.base.join(&decoded).ok()?;
        if !matches!(absolute.scheme(), "http" | "https") {
            return None;
        }

        let local = self.mapping.lookup(absolute.as_str())?;
        Some(self.prefixed(local, absolute.fragment()))
    }

    fn prefixed(&self, local: &str, fragment: Option<&str>) -> String {
        match fragment {
            Some(frag) => format!("{}{local}#{frag}", self.prefix.as_str()),
            None => format!("{}{local}", self.prefix.as_str()),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> PathPrefix {
        self.prefix
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        self.base
    }
}

/// Mapped entries indexed by path component, for matching script literals
/// such as `"/_next/static/chunks/app.js"` that carry no origin.
#[derive(Debug, Default)]
pub struct PathIndex {
    entries: HashMap<String, Vec<(String, String)>>,
}

impl PathIndex {
    #[must_use]
    pub fn build(mapping: &UrlMapping) -> Self {
        let mut entries: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for (url, local) in mapping.iter() {
            let Ok(parsed) = Url::parse(url) else {
                continue;
            };
            let path = path_component(&parsed);
            if path.len() <= 1 {
                continue;
            }
            entries
                .entry(path)
                .or_default()
                .push((parsed.origin().ascii_serialization(), local.to_string()));
        }
        for candidates in entries.values_mut() {
            candidates.sort();
        }
        Self { entries }
    }

    /// Local path for `path`, preferring an entry on `origin`.
    #[must_use]
    pub fn lookup(&self, path: &str, origin: &str) -> Option<&str> {
        let candidates = self.entries.get(path)?;
        candidates
            .iter()
            .find(|(o, _)| o == origin)
            .or_else(|| candidates.first())
            .map(|(_, local)| local.as_str())
    }
}

/// Rewrites every document of one snapshot against its complete mapping.
#[derive(Debug)]
pub struct Rewriter<'a> {
    mapping: &'a UrlMapping,
    paths: PathIndex,
}

impl<'a> Rewriter<'a> {
    #[must_use]
    pub fn new(mapping: &'a UrlMapping) -> Self {
        Self {
            mapping,
            paths: PathIndex::build(mapping),
        }
    }

    /// Rewrite a captured page stored at `prefix` depth.
    ///
    /// # Errors
    ///
    /// Returns an error if the markup cannot be streamed through the rewriter.
    pub fn rewrite_page(
        &self,
        markup: &str,
        page_url: &Url,
        prefix: PathPrefix,
    ) -> Result<String, RewriteError> {
        let resolver = Resolver::new(self.mapping, page_url, prefix);
        rewrite_html(markup, &resolver, &self.paths)
    }

    /// Rewrite `url()` references inside a captured stylesheet.
    #[must_use]
    pub fn rewrite_stylesheet(&self, css: &str, sheet_url: &Url) -> String {
        let resolver = Resolver::new(self.mapping, sheet_url, PathPrefix::Stylesheet);
        rewrite_css(css, &resolver).into_owned()
    }
}

/// Decode the entities that commonly appear inside attribute URLs.
#[must_use]
pub fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
        .replace("&amp;", "&")
}
