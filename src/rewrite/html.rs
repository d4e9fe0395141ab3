use std::cell::{Cell, RefCell};

use lol_html::html_content::ContentType;
use lol_html::{element, text, HtmlRewriter, Settings};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::banner::{banner_html, fallback_script};
use super::css::rewrite_css;
use super::script::rewrite_script;
use super::{PathIndex, Resolver, RewriteError};

static BASE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("valid selector"));

/// Attributes holding a single URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "poster", "data-src"];

/// Attributes holding a comma-separated candidate list.
const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset", "imagesrcset"];

/// Base href injected into every page, including those under `pages/`.
///
/// Rewritten paths already carry their own `./` or `../` prefix, so the base
/// must resolve to the page's own directory; `../` would double the climb.
const LOCAL_BASE_HREF: &str = "./";

/// Rewrite one page's markup for offline use.
///
/// Every URL-bearing attribute, `srcset` list, inline style, `<style>` block
/// and inline `<script>` is passed through `resolver`. A `<base>` pointing at
/// the snapshot directory is ensured, and the offline banner and fallback
/// script are injected into `<body>`.
///
/// # Errors
///
/// Returns an error if the rewriter rejects the markup.
pub fn rewrite_html(
    markup: &str,
    resolver: &Resolver<'_>,
    paths: &PathIndex,
) -> Result<String, RewriteError> {
    let has_base = Html::parse_document(markup)
        .select(&BASE_SELECTOR)
        .next()
        .is_some();

    let style_buffer = RefCell::new(String::new());
    let script_buffer = RefCell::new(String::new());
    let inline_script = Cell::new(false);

    let mut handlers = vec![
        element!("base[href]", |el| {
            let href = el.get_attribute("href").unwrap_or_default();
            if href != LOCAL_BASE_HREF {
                el.set_attribute("href", LOCAL_BASE_HREF)?;
            }
            Ok(())
        }),
        element!("head", |el| {
            if !has_base {
                el.prepend(
                    &format!(r#"<base href="{LOCAL_BASE_HREF}">"#),
                    ContentType::Html,
                );
            }
            Ok(())
        }),
        element!("body", |el| {
            el.prepend(&banner_html(), ContentType::Html);
            el.append(&fallback_script(), ContentType::Html);
            Ok(())
        }),
        element!("[style]", |el| {
            if let Some(style) = el.get_attribute("style") {
                let rewritten = rewrite_css(&style, resolver);
                if rewritten != style {
                    el.set_attribute("style", &rewritten)?;
                }
            }
            Ok(())
        }),
        element!("script", |el| {
            inline_script.set(!el.has_attribute("src"));
            Ok(())
        }),
        text!("style", |chunk| {
            style_buffer.borrow_mut().push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                let css = std::mem::take(&mut *style_buffer.borrow_mut());
                chunk.replace(&rewrite_css(&css, resolver), ContentType::Html);
            } else {
                chunk.remove();
            }
            Ok(())
        }),
        text!("script", |chunk| {
            if !inline_script.get() {
                return Ok(());
            }
            script_buffer.borrow_mut().push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                let source = std::mem::take(&mut *script_buffer.borrow_mut());
                chunk.replace(&rewrite_script(&source, resolver, paths), ContentType::Html);
            } else {
                chunk.remove();
            }
            Ok(())
        }),
    ];

    for attr in URL_ATTRIBUTES {
        handlers.push(element!(format!("[{attr}]"), move |el| {
            if el.tag_name() == "base" {
                return Ok(());
            }
            let Some(value) = el.get_attribute(attr) else {
                return Ok(());
            };
            if let Some(local) = resolver.resolve(&value) {
                el.set_attribute(attr, &local)?;
                // Local copies are not byte-identical once rewritten
                el.remove_attribute("integrity");
            }
            Ok(())
        }));
    }

    for attr in SRCSET_ATTRIBUTES {
        handlers.push(element!(format!("[{attr}]"), move |el| {
            if let Some(value) = el.get_attribute(attr) {
                let rewritten = rewrite_srcset(&value, resolver);
                if rewritten != value {
                    el.set_attribute(attr, &rewritten)?;
                }
            }
            Ok(())
        }));
    }

    let mut output = Vec::with_capacity(markup.len() + 4096);
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(markup.as_bytes())
        .map_err(|e| RewriteError::Html(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| RewriteError::Html(e.to_string()))?;

    Ok(String::from_utf8(output)?)
}

/// Rewrite each candidate URL of a `srcset`, keeping its descriptor.
fn rewrite_srcset(value: &str, resolver: &Resolver<'_>) -> String {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (url, descriptor) = entry
                .split_once(char::is_whitespace)
                .map_or((entry, ""), |(u, d)| (u, d.trim()));
            let url = resolver.resolve(url).unwrap_or_else(|| url.to_string());
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
