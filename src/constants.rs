//! Shared constants used across the application.

/// User agent string presented by the capture browser.
///
/// A realistic desktop Chrome user agent, so captured pages render the same
/// markup a regular visitor would receive.
pub const CAPTURE_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Version reported by the health endpoint.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of the root page inside a snapshot directory.
pub const INDEX_FILE: &str = "index.html";

/// File name of the snapshot manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Directory holding pages discovered below the root.
pub const PAGES_DIR: &str = "pages";

/// Directory holding captured assets, partitioned by category.
pub const ASSETS_DIR: &str = "assets";
