//! URL canonicalization and content-addressed identifiers.

use sha2::{Digest, Sha256};
use url::Url;

/// Hex length of a snapshot id (128 bits).
pub const SNAPSHOT_ID_LEN: usize = 32;

/// Hex length of an asset or page file stem (96 bits).
pub const ASSET_ID_LEN: usize = 24;

/// Normalize a URL for use as a snapshot or frontier key.
///
/// Drops the fragment and strips trailing slashes from the path while keeping
/// scheme, host, port and query. Unparseable input is returned unchanged.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.to_string();
    };

    // Opaque URLs (mailto:, data:) have nothing to normalize
    if parsed.cannot_be_a_base() {
        return url.to_string();
    }

    let mut normalized = parsed;
    normalized.set_fragment(None);

    let path = normalized.path().trim_end_matches('/').to_string();

    let mut out = normalized.origin().ascii_serialization();
    if normalized.origin().is_tuple() {
        out.push_str(&path);
        if let Some(query) = normalized.query() {
            out.push('?');
            out.push_str(query);
        }
        out
    } else {
        if path.is_empty() {
            normalized.set_path("/");
        } else {
            normalized.set_path(&path);
        }
        normalized.to_string()
    }
}

/// Derive the snapshot directory name for a normalized root URL.
#[must_use]
pub fn snapshot_id(canonical_url: &str) -> String {
    digest_hex(canonical_url, SNAPSHOT_ID_LEN)
}

/// Derive the file stem for a captured resource or page.
#[must_use]
pub fn asset_id(url: &str) -> String {
    digest_hex(url, ASSET_ID_LEN)
}

/// Whether `s` has the shape of a snapshot id.
///
/// Used to reject path segments before they are joined onto the cache root.
#[must_use]
pub fn is_snapshot_id(s: &str) -> bool {
    s.len() == SNAPSHOT_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

fn digest_hex(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(len);
    hex
}

/// Whether two URLs share scheme, host and port.
#[must_use]
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Strip the origin from an absolute URL, leaving path and query.
#[must_use]
pub fn path_component(url: &Url) -> String {
    let mut out = url.path().to_string();
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    out
}
