use thiserror::Error;
use url::Url;

/// Prefixes of URLs a browser extension can report but that cannot be captured.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "view-source:",
    "file:",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
];

/// A snapshot request rejected before any browser work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("URL is required")]
    Missing,
    #[error("invalid URL: {0}")]
    Invalid(String),
    #[error("cannot capture restricted URL: {0}")]
    Restricted(String),
    #[error("unsupported URL scheme '{0}': only http and https can be captured")]
    UnsupportedScheme(String),
}

/// Parse and vet a root URL supplied by a caller.
///
/// # Errors
///
/// Returns an [`InputError`] for empty, unparseable, restricted or non-http(s) input.
pub fn validate_target_url(raw: &str) -> Result<Url, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InputError::Missing);
    }

    let lower = raw.to_ascii_lowercase();
    if RESTRICTED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Err(InputError::Restricted(raw.to_string()));
    }

    let url = Url::parse(raw).map_err(|e| InputError::Invalid(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(InputError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(InputError::Invalid(format!("{raw}: missing host")));
    }
    Ok(url)
}
