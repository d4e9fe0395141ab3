//! Classification of navigation outcomes into blocked, failed and ok.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Domains known to stall or abort automated sessions.
///
/// Navigations to these (or their subdomains) use the fast-fail timeout.
pub const PROBLEMATIC_DOMAINS: &[&str] = &[
    "claude.com",
    "claude.ai",
    "stackoverflow.com",
    "browserstack.com",
    "code.visualstudio.com",
    "openai.com",
];

/// Net error codes Chromium reports when a connection is cut mid-navigation.
const ABORT_CODES: &[&str] = &[
    "ERR_ABORTED",
    "ERR_CONNECTION_RESET",
    "ERR_CONNECTION_CLOSED",
    "ERR_EMPTY_RESPONSE",
];

/// Cookies set by challenge vendors once a visitor has been profiled.
///
/// `__cf_bm` is left out: bot-managed sites set it on ordinary page views.
pub const CHALLENGE_COOKIES: &[&str] = &["cf_clearance", "datadome"];

/// Markup fragments that only appear on verification interstitials.
///
/// Only the `/h/` challenge path counts; the `jsd` detection script under
/// the same platform prefix is injected into normal pages.
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-challenge",
    "cf-turnstile",
    "/cdn-cgi/challenge-platform/h/",
    "cf_chl_opt",
    "captcha-delivery.com",
    "px-captcha",
];

/// The flavor of automation countermeasure that stopped a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Forbidden,
    Mitigation,
    ConnectionAborted,
    VerificationRequired,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Forbidden => "blocked: forbidden (HTTP 403)",
            Self::Mitigation => "blocked: likely automated-traffic mitigation (HTTP 503)",
            Self::ConnectionAborted => {
                "blocked: connection aborted, likely automation countermeasure"
            }
            Self::VerificationRequired => "blocked: interactive verification required",
        };
        f.write_str(msg)
    }
}

/// Why a single page could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("{0}")]
    Blocked(BlockKind),
    #[error("HTTP {0} error")]
    HttpStatus(u16),
    #[error("navigation timed out after {}s: site slow or deliberately stalling automated clients", .0.as_secs())]
    Timeout(Duration),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("browser error: {0}")]
    Browser(String),
}

impl CaptureError {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    #[must_use]
    pub fn block_kind(&self) -> Option<BlockKind> {
        match self {
            Self::Blocked(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Map the main document's HTTP status to a capture error, if any.
#[must_use]
pub fn classify_status(status: u16) -> Option<CaptureError> {
    match status {
        403 => Some(CaptureError::Blocked(BlockKind::Forbidden)),
        503 => Some(CaptureError::Blocked(BlockKind::Mitigation)),
        400..=599 => Some(CaptureError::HttpStatus(status)),
        _ => None,
    }
}

/// Map a browser navigation error message to a capture error.
#[must_use]
pub fn classify_navigation_error(message: &str, timeout: Duration) -> CaptureError {
    if ABORT_CODES.iter().any(|code| message.contains(code)) {
        return CaptureError::Blocked(BlockKind::ConnectionAborted);
    }
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        return CaptureError::Timeout(timeout);
    }
    CaptureError::Navigation(message.to_string())
}

/// Evidence of a verification wall gathered during one visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeSignals {
    /// Challenge vendor script URLs the interceptor let through.
    pub flagged_requests: Vec<String>,
    /// Names of cookies present after the page settled.
    pub cookie_names: Vec<String>,
}

impl ChallengeSignals {
    /// Whether the visit hit an interactive verification wall.
    ///
    /// Any challenge script, challenge cookie or interstitial marker in the
    /// rendered markup counts, even when the page itself returned 200.
    #[must_use]
    pub fn requires_verification(&self, markup: &str) -> bool {
        if !self.flagged_requests.is_empty() {
            return true;
        }
        if self
            .cookie_names
            .iter()
            .any(|name| CHALLENGE_COOKIES.contains(&name.as_str()))
        {
            return true;
        }
        CHALLENGE_MARKERS.iter().any(|m| markup.contains(m))
    }
}

/// Whether `url`'s host is on the built-in or configured problematic list.
#[must_use]
pub fn is_problematic(url: &Url, extra: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches("www.").to_lowercase();
    PROBLEMATIC_DOMAINS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .any(|domain| host == domain || host.ends_with(&format!(".{domain}")))
}

/// Navigation timeout for `url`: short for problematic domains, long otherwise.
#[must_use]
pub fn navigation_timeout(url: &Url, config: &Config) -> Duration {
    if is_problematic(url, &config.extra_problematic_domains) {
        config.fast_fail_timeout
    } else {
        config.nav_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(403),
            Some(CaptureError::Blocked(BlockKind::Forbidden))
        );
        assert_eq!(
            classify_status(503),
            Some(CaptureError::Blocked(BlockKind::Mitigation))
        );
        assert_eq!(classify_status(404), Some(CaptureError::HttpStatus(404)));
        assert_eq!(classify_status(500), Some(CaptureError::HttpStatus(500)));
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(304), None);
    }

    #[test]
    fn test_blocked_messages_are_distinct_from_failures() {
        let blocked = classify_status(403).unwrap();
        assert!(blocked.is_blocked());
        assert!(blocked.to_string().starts_with("blocked: forbidden"));

        let failed = classify_status(404).unwrap();
        assert!(!failed.is_blocked());
        assert_eq!(failed.to_string(), "HTTP 404 error");
    }

    #[test]
    fn test_classify_navigation_error() {
        let timeout = Duration::from_secs(15);
        assert_eq!(
            classify_navigation_error("net::ERR_CONNECTION_RESET at https://x", timeout),
            CaptureError::Blocked(BlockKind::ConnectionAborted)
        );
        assert_eq!(
            classify_navigation_error("Request timed out.", timeout),
            CaptureError::Timeout(timeout)
        );
        assert!(matches!(
            classify_navigation_error("net::ERR_NAME_NOT_RESOLVED", timeout),
            CaptureError::Navigation(_)
        ));
    }

    #[test]
    fn test_timeout_message() {
        let err = CaptureError::Timeout(Duration::from_secs(60));
        assert!(err.to_string().contains("after 60s"));
        assert!(err.to_string().contains("stalling automated clients"));
    }

    #[test]
    fn test_challenge_signals() {
        let clean = ChallengeSignals::default();
        assert!(!clean.requires_verification("<html><body>Hello</body></html>"));
        assert!(clean.requires_verification(r#"<div class="cf-turnstile"></div>"#));

        let cookie = ChallengeSignals {
            cookie_names: vec!["session".to_string(), "cf_clearance".to_string()],
            ..Default::default()
        };
        assert!(cookie.requires_verification("<html></html>"));

        let script = ChallengeSignals {
            flagged_requests: vec!["https://challenges.cloudflare.com/turnstile/v0/api.js".into()],
            ..Default::default()
        };
        assert!(script.requires_verification("<html></html>"));
    }

    #[test]
    fn test_routine_cloudflare_traffic_is_not_a_wall() {
        let jsd = r#"<html><body><h1>Docs</h1><script>(function(){var a=document.createElement('script');a.src='/cdn-cgi/challenge-platform/scripts/jsd/main.js';document.head.appendChild(a);})();</script></body></html>"#;
        assert!(!ChallengeSignals::default().requires_verification(jsd));

        let bot_management = ChallengeSignals {
            cookie_names: vec!["__cf_bm".to_string(), "_cfuvid".to_string()],
            ..Default::default()
        };
        assert!(!bot_management.requires_verification("<html><body>Docs</body></html>"));

        let interstitial = r#"<script src="/cdn-cgi/challenge-platform/h/b/orchestrate/chl_page/v1"></script>"#;
        assert!(ChallengeSignals::default().requires_verification(interstitial));
    }

    #[test]
    fn test_problematic_domains() {
        let claude = Url::parse("https://www.claude.com/pricing").unwrap();
        let sub = Url::parse("https://docs.stackoverflow.com/").unwrap();
        let normal = Url::parse("https://example.com/").unwrap();
        let lookalike = Url::parse("https://notclaude.com/").unwrap();

        assert!(is_problematic(&claude, &[]));
        assert!(is_problematic(&sub, &[]));
        assert!(!is_problematic(&normal, &[]));
        assert!(!is_problematic(&lookalike, &[]));
        assert!(is_problematic(&normal, &["example.com".to_string()]));
    }

    #[test]
    fn test_navigation_timeout() {
        let config = Config::for_testing();
        let slow = Url::parse("https://claude.com/").unwrap();
        let normal = Url::parse("https://example.com/").unwrap();
        assert_eq!(navigation_timeout(&slow, &config), config.fast_fail_timeout);
        assert_eq!(navigation_timeout(&normal, &config), config.nav_timeout);
    }
}
