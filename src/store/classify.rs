//! Asset classification by media type and URL shape.

use serde::{Deserialize, Serialize};
use url::Url;

/// Storage category of a captured asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Style,
    Script,
    Image,
    Font,
    Data,
    Misc,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 6] = [
        Self::Style,
        Self::Script,
        Self::Image,
        Self::Font,
        Self::Data,
        Self::Misc,
    ];

    /// Directory name under `assets/`.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Style => "styles",
            Self::Script => "scripts",
            Self::Image => "images",
            Self::Font => "fonts",
            Self::Data => "data",
            Self::Misc => "misc",
        }
    }
}

/// Path fragments that identify image-resizing proxy endpoints.
const IMAGE_PROXY_PATHS: &[&str] = &["/_next/image", "/_vercel/image", "/cdn-cgi/image"];

/// Query parameters an image proxy uses to carry the original image URL.
const IMAGE_PROXY_PARAMS: &[&str] = &["url", "src"];

const DEFAULT_PROXY_IMAGE_EXT: &str = ".jpg";
const GENERIC_EXT: &str = ".bin";

/// Assign a storage category and file extension (with leading dot).
#[must_use]
pub fn classify(content_type: Option<&str>, url: &str) -> (AssetCategory, String) {
    let media = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
        .filter(|ct| !ct.is_empty());

    let category = media.as_deref().map_or_else(
        || category_from_path(url),
        category_from_media,
    );

    (category, extension_for(media.as_deref(), url))
}

fn category_from_media(media: &str) -> AssetCategory {
    if media.contains("css") {
        AssetCategory::Style
    } else if media.contains("javascript") || media.contains("ecmascript") {
        AssetCategory::Script
    } else if media.contains("image") {
        AssetCategory::Image
    } else if media.contains("font") {
        AssetCategory::Font
    } else if media.contains("json") {
        AssetCategory::Data
    } else {
        AssetCategory::Misc
    }
}

fn category_from_path(url: &str) -> AssetCategory {
    match path_extension(url).as_deref() {
        Some(".css") => AssetCategory::Style,
        Some(".js" | ".mjs") => AssetCategory::Script,
        Some(".jpg" | ".jpeg" | ".png" | ".gif" | ".svg" | ".webp" | ".ico" | ".avif") => {
            AssetCategory::Image
        }
        Some(".woff" | ".woff2" | ".ttf" | ".otf" | ".eot") => AssetCategory::Font,
        Some(".json") => AssetCategory::Data,
        _ if proxied_image_url(url).is_some() => AssetCategory::Image,
        _ => AssetCategory::Misc,
    }
}

fn extension_for(media: Option<&str>, url: &str) -> String {
    if let Some(ext) = media.and_then(extension_for_media) {
        return format!(".{ext}");
    }

    if let Some(original) = proxied_image_url(url) {
        return path_extension(&original).unwrap_or_else(|| DEFAULT_PROXY_IMAGE_EXT.to_string());
    }

    path_extension(url).unwrap_or_else(|| GENERIC_EXT.to_string())
}

/// Canonical file extensions for the media types a page commonly loads.
fn extension_for_media(media: &str) -> Option<&'static str> {
    let ext = match media {
        "text/css" => "css",
        "application/javascript" | "text/javascript" | "application/x-javascript"
        | "application/ecmascript" | "text/ecmascript" => "js",
        "application/json" | "application/manifest+json" | "application/ld+json" => "json",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpeg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "font/woff" | "application/font-woff" => "woff",
        "font/woff2" | "application/font-woff2" => "woff2",
        "font/ttf" | "application/x-font-ttf" => "ttf",
        "font/otf" | "application/x-font-otf" => "otf",
        "application/vnd.ms-fontobject" => "eot",
        "text/html" => "html",
        "text/plain" => "txt",
        "application/xml" | "text/xml" => "xml",
        "application/wasm" => "wasm",
        "video/mp4" => "mp4",
        "audio/mpeg" => "mp3",
        _ => return None,
    };
    Some(ext)
}

/// If `url` is an image-resizing proxy endpoint, return the encoded original URL.
fn proxied_image_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    let is_proxy = IMAGE_PROXY_PATHS.iter().any(|p| path.contains(p));
    if !is_proxy {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(k, _)| IMAGE_PROXY_PARAMS.contains(&k.as_ref()))
        .map(|(_, v)| v.into_owned())
}

/// Lower-cased extension (with dot) of the trailing path segment.
fn path_extension(url: &str) -> Option<String> {
    let path = Url::parse(url).map_or_else(
        |_| {
            // Relative reference: drop query and fragment by hand
            url.split(['?', '#']).next().unwrap_or("").to_string()
        },
        |u| u.path().to_string(),
    );
    let segment = path.rsplit('/').next()?;
    let dot = segment.rfind('.')?;
    let ext = &segment[dot + 1..];
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}
