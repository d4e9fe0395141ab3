//! Request interception rules applied while a page loads.

use url::Url;

/// What the interceptor does with an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptAction {
    /// Answer locally with a JSON body; the request never leaves the browser.
    Fulfill { body: &'static str },
    /// Fail the request as blocked by the client.
    Block,
    /// Let the request through but record it as a challenge signal.
    ContinueFlagged,
    Continue,
}

/// Environment probes answered with deterministic values.
const MOCKED_ENDPOINTS: &[(&str, &str)] = &[
    ("/api/country", r#"{"country":"US","region":"Americas"}"#),
    ("/api/geo", r#"{"country":"US","region":"Americas","city":"New York"}"#),
    ("/api/location", r#"{"country":"US","region":"Americas"}"#),
    ("/api/user", r#"{"logged_in":false}"#),
];

/// Verification widgets that only ever render a challenge.
const BLOCKED_PATTERNS: &[&str] = &[
    "google.com/recaptcha",
    "gstatic.com/recaptcha",
    "recaptcha.net",
    "hcaptcha.com",
];

/// Challenge vendor scripts whose presence marks the page as walled.
const FLAGGED_PATTERNS: &[&str] = &[
    "challenges.cloudflare.com",
    "/cdn-cgi/challenge-platform/h/",
    "turnstile",
    "cf-challenge",
    "captcha-delivery.com",
    "px-captcha",
    "perimeterx.net",
];

/// Decide how to handle a request for `url`.
#[must_use]
pub fn decide(url: &str) -> InterceptAction {
    if let Ok(parsed) = Url::parse(url) {
        let path = parsed.path().trim_end_matches('/');
        if let Some((_, body)) = MOCKED_ENDPOINTS.iter().find(|(p, _)| path == *p) {
            return InterceptAction::Fulfill { body };
        }
    }

    let lower = url.to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return InterceptAction::Block;
    }
    if FLAGGED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return InterceptAction::ContinueFlagged;
    }
    InterceptAction::Continue
}
