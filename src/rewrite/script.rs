use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{PathIndex, Resolver};

/// String literals in inline script: escaped-double, double and single quoted.
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\\"([^"\\]+)\\"|"([^"\\\n]*)"|'([^'\\\n]*)'"#).expect("valid regex")
});

/// Replace script string literals that name a mapped URL or path.
///
/// Only whole literals are replaced. A literal matches when it is an
/// absolute URL in the mapping, or a root-relative path equal to the path
/// component of a mapped URL.
pub fn rewrite_script<'a>(
    source: &'a str,
    resolver: &Resolver<'_>,
    paths: &PathIndex,
) -> Cow<'a, str> {
    let origin = resolver.base().origin().ascii_serialization();

    STRING_LITERAL.replace_all(source, |caps: &Captures<'_>| {
        let (value, open, close) = if let Some(m) = caps.get(1) {
            (m.as_str(), "\\\"", "\\\"")
        } else if let Some(m) = caps.get(2) {
            (m.as_str(), "\"", "\"")
        } else {
            (caps.get(3).map_or("", |m| m.as_str()), "'", "'")
        };

        literal_target(value, resolver, paths, &origin).map_or_else(
            || caps[0].to_string(),
            |local| format!("{open}{local}{close}"),
        )
    })
}

fn literal_target(
    value: &str,
    resolver: &Resolver<'_>,
    paths: &PathIndex,
    origin: &str,
) -> Option<String> {
    if value.len() <= 1 {
        return None;
    }

    if value.starts_with("http://") || value.starts_with("https://") || value.starts_with("//") {
        return resolver.resolve(value);
    }

    if value.starts_with('/') {
        return paths
            .lookup(value, origin)
            .map(|local| format!("{}{local}", resolver.prefix().as_str()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::PathPrefix;
    use crate::store::UrlMapping;
    use url::Url;

    fn setup() -> (UrlMapping, Url) {
        let mut mapping = UrlMapping::new();
        mapping.insert_asset(
            "https://example.com/_next/static/chunks/app.js",
            "assets/scripts/c1.js",
        );
        mapping.insert_asset("https://cdn.example.net/logo.svg", "assets/images/l.svg");
        mapping.insert_page("https://example.com/about", "pages/page_a.html");
        (mapping, Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn test_rewrites_path_literals_in_each_quote_form() {
        let (mapping, page) = setup();
        let paths = PathIndex::build(&mapping);
        let resolver = Resolver::new(&mapping, &page, PathPrefix::Root);

        let src = r#"load("/_next/static/chunks/app.js"); go('/about'); x="{\"src\":\"/_next/static/chunks/app.js\"}";"#;
        let out = rewrite_script(src, &resolver, &paths);
        assert_eq!(
            out,
            r#"load("./assets/scripts/c1.js"); go('./pages/page_a.html'); x="{\"src\":\"./assets/scripts/c1.js\"}";"#
        );
    }

    #[test]
    fn test_rewrites_absolute_literals() {
        let (mapping, page) = setup();
        let paths = PathIndex::build(&mapping);
        let resolver = Resolver::new(&mapping, &page, PathPrefix::Page);

        let out = rewrite_script(r#"img.src = "https://cdn.example.net/logo.svg";"#, &resolver, &paths);
        assert_eq!(out, r#"img.src = "../assets/images/l.svg";"#);
    }

    #[test]
    fn test_leaves_unrelated_literals_alone() {
        let (mapping, page) = setup();
        let paths = PathIndex::build(&mapping);
        let resolver = Resolver::new(&mapping, &page, PathPrefix::Root);

        let src = r#"var a = "/"; var b = 'about'; var c = "/_next/static/chunks/app.js.map"; var d = "https://other.org/_next/static/chunks/app.js";"#;
        assert_eq!(rewrite_script(src, &resolver, &paths), src);
    }
}
