use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::Resolver;

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#).expect("valid regex")
});

/// Rewrite every `url(...)` node whose target is mapped, keeping its quoting.
pub fn rewrite_css<'a>(css: &'a str, resolver: &Resolver<'_>) -> Cow<'a, str> {
    CSS_URL.replace_all(css, |caps: &Captures<'_>| {
        let (value, quote) = if let Some(m) = caps.get(1) {
            (m.as_str(), "\"")
        } else if let Some(m) = caps.get(2) {
            (m.as_str(), "'")
        } else {
            (caps.get(3).map_or("", |m| m.as_str()), "")
        };

        resolver.resolve(value).map_or_else(
            || caps[0].to_string(),
            |local| format!("url({quote}{local}{quote})"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::PathPrefix;
    use crate::store::UrlMapping;
    use url::Url;

    fn mapping() -> UrlMapping {
        let mut mapping = UrlMapping::new();
        mapping.insert_asset("https://example.com/img/bg.png", "assets/images/aaa.png");
        mapping.insert_asset("https://fonts.example.net/f.woff2", "assets/fonts/bbb.woff2");
        mapping
    }

    #[test]
    fn test_rewrites_each_quoting_form() {
        let mapping = mapping();
        let page = Url::parse("https://example.com/").unwrap();
        let resolver = Resolver::new(&mapping, &page, PathPrefix::Root);

        let css = r#"a{background:url(/img/bg.png)} b{background:url( "img/bg.png" )} @font-face{src:url('//fonts.example.net/f.woff2')}"#;
        let out = rewrite_css(css, &resolver);
        assert_eq!(
            out,
            r#"a{background:url(./assets/images/aaa.png)} b{background:url("./assets/images/aaa.png")} @font-face{src:url('./assets/fonts/bbb.woff2')}"#
        );
    }

    #[test]
    fn test_unmapped_and_inline_urls_are_untouched() {
        let mapping = mapping();
        let page = Url::parse("https://example.com/").unwrap();
        let resolver = Resolver::new(&mapping, &page, PathPrefix::Root);

        let css = "a{background:url(data:image/png;base64,AAAA)} b{background:url(/missing.png)}";
        assert_eq!(rewrite_css(css, &resolver), css);
    }

    #[test]
    fn test_stylesheet_prefix_climbs_out_of_asset_dir() {
        let mapping = mapping();
        let sheet = Url::parse("https://example.com/css/site.css").unwrap();
        let resolver = Resolver::new(&mapping, &sheet, PathPrefix::Stylesheet);
        assert_eq!(
            rewrite_css("x{background:url(../img/bg.png)}", &resolver),
            "x{background:url(../../assets/images/aaa.png)}"
        );
    }
}
