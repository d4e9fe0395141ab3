use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::normalize::{normalize_url, same_origin};

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Schemes and prefixes that never lead to a crawlable page.
const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Extract normalized same-origin page links from rendered markup.
///
/// Hrefs are resolved against `page_url`; anything that is not http(s) or not
/// on `origin`'s scheme/host/port is dropped. Order of first appearance is kept.
#[must_use]
pub fn extract_same_origin_links(html: &str, page_url: &Url, origin: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        if href.is_empty() {
            continue;
        }
        let lower = href.to_ascii_lowercase();
        if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            continue;
        }

        let Ok(resolved) = page_url.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if !same_origin(&resolved, origin) {
            continue;
        }

        let normalized = normalize_url(resolved.as_str());
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }

    links
}
