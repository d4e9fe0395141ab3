use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img, source").expect("valid selector"));

static INLINE_IMAGE_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)src=["']([^"']+\.(?:png|jpe?g|svg|webp|gif)(?:\?[^"']*)?)["']"#)
        .expect("valid regex")
});

/// Collect absolute image URLs referenced by rendered markup.
///
/// Covers `src`, `srcset` and `data-src` on `img`/`source` elements, plus
/// `src="...png"` style references embedded in scripts or templates.
#[must_use]
pub fn image_candidates(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut raw: Vec<String> = Vec::new();

    for element in document.select(&IMG_SELECTOR) {
        let el = element.value();
        for attr in ["src", "data-src"] {
            if let Some(value) = el.attr(attr) {
                raw.push(value.to_string());
            }
        }
        if let Some(srcset) = el.attr("srcset") {
            raw.extend(srcset_urls(srcset).map(str::to_string));
        }
    }

    for caps in INLINE_IMAGE_SRC.captures_iter(html) {
        if let Some(m) = caps.get(1) {
            raw.push(m.as_str().to_string());
        }
    }

    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|value| {
            let value = value.trim();
            if value.is_empty() || value.starts_with("data:") || value.starts_with("blob:") {
                return None;
            }
            let resolved = base.join(value).ok()?;
            matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// URLs of a `srcset` attribute, without width/density descriptors.
pub(crate) fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
}
