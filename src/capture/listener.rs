use std::collections::HashSet;

use tracing::debug;

/// Metadata of one network response reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub mime_type: Option<String>,
    /// Whether the browser reported this as a document load.
    pub is_document: bool,
}

/// Filters the responses of one visit down to the ones worth persisting.
///
/// The first document response is the page itself: its status is kept for
/// classification and its body is not treated as an asset.
#[derive(Debug, Default)]
pub struct ResourceBuffer {
    accepted: Vec<ObservedResponse>,
    seen: HashSet<String>,
    main_status: Option<u16>,
    skipped_errors: usize,
}

impl ResourceBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a response, returning whether its body should be fetched.
    pub fn observe(&mut self, response: ObservedResponse) -> bool {
        if response.is_document && self.main_status.is_none() {
            self.main_status = Some(response.status);
            self.seen.insert(response.url);
            return false;
        }

        if response.url.starts_with("data:") || response.url.starts_with("blob:") {
            return false;
        }

        if response.status >= 400 {
            debug!(url = %response.url, status = response.status, "Skipping failed response");
            self.skipped_errors += 1;
            return false;
        }

        if !self.seen.insert(response.url.clone()) {
            return false;
        }

        self.accepted.push(response);
        true
    }

    /// HTTP status of the main document, once seen.
    #[must_use]
    pub fn main_status(&self) -> Option<u16> {
        self.main_status
    }

    #[must_use]
    pub fn has_seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    #[must_use]
    pub fn skipped_errors(&self) -> usize {
        self.skipped_errors
    }

    /// Take the accepted responses, leaving the buffer empty but still deduplicating.
    pub fn drain(&mut self) -> Vec<ObservedResponse> {
        std::mem::take(&mut self.accepted)
    }
}
