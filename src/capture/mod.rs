//! Page capture: driving a headless browser and observing what a page loads.

mod browser;
pub mod countermeasure;
mod images;
pub mod intercept;
mod listener;
pub mod scroll;
mod visitor;

use async_trait::async_trait;
use serde::Deserialize;

pub use browser::BrowserService;
pub use countermeasure::{BlockKind, CaptureError};
pub use images::image_candidates;
pub use listener::{ObservedResponse, ResourceBuffer};
pub use visitor::ChromiumVisitor;

/// A network response body observed while a page loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResource {
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// The outcome of visiting one page.
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// URL the page settled on after redirects.
    pub final_url: String,
    /// Rendered markup after scrolling and image materialization.
    pub markup: String,
    pub depth: u32,
    pub resources: Vec<CapturedResource>,
}

/// A cookie supplied by the caller to authenticate the capture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub http_only: Option<bool>,
}

/// One page the orchestrator wants captured.
#[derive(Debug, Clone)]
pub struct VisitRequest {
    pub url: String,
    pub depth: u32,
    pub cookies: Vec<AuthCookie>,
}

/// Something that can render a page and report what it loaded.
#[async_trait]
pub trait PageVisitor: Send + Sync {
    /// Navigate to `request.url` and capture the rendered page.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CaptureError`]; blocked verdicts are kept
    /// distinct from ordinary navigation failures.
    async fn visit(&self, request: &VisitRequest) -> Result<PageCapture, CaptureError>;

    /// Release any long-lived resources.
    async fn shutdown(&self) {}
}
