//! Chromium-backed [`PageVisitor`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, FulfillRequestParams,
    HeaderEntry,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, CookieParam, ErrorReason, EventResponseReceived, GetResponseBodyParams, RequestId,
    ResourceType,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::browser::BrowserService;
use super::countermeasure::{
    classify_navigation_error, classify_status, navigation_timeout, BlockKind, ChallengeSignals,
};
use super::images::image_candidates;
use super::intercept::{decide, InterceptAction};
use super::listener::{ObservedResponse, ResourceBuffer};
use super::scroll::{ScrollPlan, ScrollStep};
use super::{AuthCookie, CaptureError, CapturedResource, PageCapture, PageVisitor, VisitRequest};
use crate::config::Config;

const DOCUMENT_HEIGHT_JS: &str =
    "Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight)";

/// Scrolls to an offset and gives lazy images without a `src` their `data-src`.
const SCROLL_STEP_JS: &str = r"
(offset) => {
    window.scrollTo(0, offset);
    document.querySelectorAll('img[data-src]').forEach((img) => {
        if (!img.getAttribute('src')) { img.src = img.dataset.src; }
    });
    return true;
}";

/// Requests every listed URL from inside the page so the browser observes it.
const FORCE_FETCH_JS: &str = r"
(urls) => Promise.allSettled(
    urls.map((u) => fetch(u, { mode: 'no-cors', credentials: 'include' }).then((r) => r.blob()))
).then((results) => results.filter((r) => r.status === 'fulfilled').length)";

/// Per-visit state shared with the event tasks.
#[derive(Default)]
struct VisitState {
    buffer: Mutex<ResourceBuffer>,
    flagged: Mutex<Vec<String>>,
}

pub struct ChromiumVisitor {
    config: Arc<Config>,
    browser: BrowserService,
}

impl ChromiumVisitor {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            browser: BrowserService::new(Arc::clone(&config)),
            config,
        }
    }

    async fn capture_page(
        &self,
        page: &Page,
        request: &VisitRequest,
    ) -> Result<PageCapture, CaptureError> {
        let url = Url::parse(&request.url)
            .map_err(|e| CaptureError::Navigation(format!("invalid URL: {e}")))?;

        if !request.cookies.is_empty() {
            install_cookies(page, &url, &request.cookies).await?;
        }

        let state = Arc::new(VisitState::default());
        let tasks = attach_observers(page, &state).await?;

        let result = self.drive(page, &url, request.depth, &state).await;

        for task in tasks {
            task.abort();
        }
        result
    }

    async fn drive(
        &self,
        page: &Page,
        url: &Url,
        depth: u32,
        state: &VisitState,
    ) -> Result<PageCapture, CaptureError> {
        let timeout = navigation_timeout(url, &self.config);
        info!(url = %url, depth, timeout_secs = timeout.as_secs(), "Navigating");

        match tokio::time::timeout(timeout, page.goto(url.as_str())).await {
            Err(_) => return Err(CaptureError::Timeout(timeout)),
            Ok(Err(e)) => return Err(classify_navigation_error(&e.to_string(), timeout)),
            Ok(Ok(_)) => {}
        }

        tokio::time::sleep(self.config.settle_delay).await;

        if let Some(status) = state.buffer.lock().await.main_status() {
            debug!(url = %url, status, "Main document response");
            if let Some(err) = classify_status(status) {
                return Err(err);
            }
        }

        self.check_challenge(page, state).await?;

        self.scroll(page).await;
        self.force_images(page, url, state).await;

        let markup = page.content().await.map_err(browser_error)?;
        self.check_challenge_markup(page, state, &markup).await?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        let resources = collect_bodies(page, state).await;
        info!(
            url = %url,
            depth,
            resources = resources.len(),
            bytes = markup.len(),
            "Page captured"
        );

        Ok(PageCapture {
            final_url,
            markup,
            depth,
            resources,
        })
    }

    async fn check_challenge(&self, page: &Page, state: &VisitState) -> Result<(), CaptureError> {
        let markup = page.content().await.map_err(browser_error)?;
        self.check_challenge_markup(page, state, &markup).await
    }

    async fn check_challenge_markup(
        &self,
        page: &Page,
        state: &VisitState,
        markup: &str,
    ) -> Result<(), CaptureError> {
        let cookie_names = page
            .get_cookies()
            .await
            .map(|cookies| cookies.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();
        let signals = ChallengeSignals {
            flagged_requests: state.flagged.lock().await.clone(),
            cookie_names,
        };

        if signals.requires_verification(markup) {
            warn!(
                flagged = signals.flagged_requests.len(),
                "Verification challenge detected"
            );
            return Err(CaptureError::Blocked(BlockKind::VerificationRequired));
        }
        Ok(())
    }

    /// Scroll down one viewport at a time, then return to the top.
    async fn scroll(&self, page: &Page) {
        let mut plan = ScrollPlan::new(self.config.viewport_height);

        loop {
            let height = match evaluate_value::<u64>(page, DOCUMENT_HEIGHT_JS).await {
                Ok(h) => h,
                Err(e) => {
                    debug!("Page unavailable during scroll: {e}");
                    return;
                }
            };

            match plan.next_step(height) {
                ScrollStep::To(offset) => {
                    let script = format!("({SCROLL_STEP_JS})({offset})");
                    if let Err(e) = evaluate_value::<bool>(page, &script).await {
                        debug!("Scroll step failed: {e}");
                        return;
                    }
                    tokio::time::sleep(self.config.settle_delay).await;
                }
                ScrollStep::Stop(reason) => {
                    debug!(?reason, steps = plan.attempts(), "Scrolling finished");
                    break;
                }
            }
        }

        if let Err(e) = evaluate_value::<bool>(page, "(window.scrollTo(0, 0), true)").await {
            debug!("Failed to scroll back to top: {e}");
        }
    }

    /// Fetch images the page references but the browser never requested.
    async fn force_images(&self, page: &Page, url: &Url, state: &VisitState) {
        let markup = match page.content().await {
            Ok(markup) => markup,
            Err(e) => {
                debug!("Could not read markup for image discovery: {e}");
                return;
            }
        };

        let missing: Vec<String> = {
            let buffer = state.buffer.lock().await;
            image_candidates(&markup, url)
                .into_iter()
                .filter(|candidate| !buffer.has_seen(candidate))
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        let Ok(urls_json) = serde_json::to_string(&missing) else {
            return;
        };
        let script = format!("({FORCE_FETCH_JS})({urls_json})");
        match evaluate_value::<u64>(page, &script).await {
            Ok(fetched) => debug!(requested = missing.len(), fetched, "Forced image fetches"),
            Err(e) => debug!("Forced image fetch failed: {e}"),
        }

        // Let response events for the forced fetches arrive
        tokio::time::sleep(self.config.settle_delay).await;
    }
}

#[async_trait]
impl PageVisitor for ChromiumVisitor {
    async fn visit(&self, request: &VisitRequest) -> Result<PageCapture, CaptureError> {
        let isolated = self
            .browser
            .open_isolated()
            .await
            .map_err(|e| CaptureError::Browser(format!("{e:#}")))?;

        let result = self.capture_page(&isolated.page, request).await;
        self.browser.release(isolated).await;
        result
    }

    async fn shutdown(&self) {
        self.browser.shutdown().await;
    }
}

fn browser_error(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Browser(e.to_string())
}

async fn evaluate_value<T: serde::de::DeserializeOwned>(
    page: &Page,
    script: &str,
) -> Result<T, CaptureError> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(CaptureError::Browser)?;
    page.evaluate_expression(params)
        .await
        .map_err(browser_error)?
        .into_value::<T>()
        .map_err(browser_error)
}

async fn install_cookies(
    page: &Page,
    url: &Url,
    cookies: &[AuthCookie],
) -> Result<(), CaptureError> {
    let mut params = Vec::with_capacity(cookies.len());
    for cookie in cookies {
        let mut builder = CookieParam::builder()
            .name(cookie.name.clone())
            .value(cookie.value.clone());
        builder = match &cookie.domain {
            Some(domain) => builder.domain(domain.clone()),
            None => builder.url(url.to_string()),
        };
        if let Some(path) = &cookie.path {
            builder = builder.path(path.clone());
        }
        if let Some(secure) = cookie.secure {
            builder = builder.secure(secure);
        }
        if let Some(http_only) = cookie.http_only {
            builder = builder.http_only(http_only);
        }
        params.push(builder.build().map_err(CaptureError::Browser)?);
    }

    debug!(count = params.len(), "Installing caller cookies");
    page.set_cookies(params).await.map_err(browser_error)?;
    Ok(())
}

/// Enable the network and fetch domains and spawn their event loops.
async fn attach_observers(
    page: &Page,
    state: &Arc<VisitState>,
) -> Result<Vec<JoinHandle<()>>, CaptureError> {
    page.execute(network::EnableParams::default())
        .await
        .map_err(browser_error)?;

    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(browser_error)?;
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(browser_error)?;

    page.execute(fetch::EnableParams::default())
        .await
        .map_err(browser_error)?;

    let response_state = Arc::clone(state);
    let response_task = tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            let observed = ObservedResponse {
                request_id: event.request_id.inner().clone(),
                url: event.response.url.clone(),
                status: u16::try_from(event.response.status).unwrap_or(0),
                mime_type: Some(event.response.mime_type.clone()).filter(|m| !m.is_empty()),
                is_document: event.r#type == ResourceType::Document,
            };
            response_state.buffer.lock().await.observe(observed);
        }
    });

    let intercept_page = page.clone();
    let intercept_state = Arc::clone(state);
    let intercept_task = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let request_url = event.request.url.clone();
            let outcome = match decide(&request_url) {
                InterceptAction::Fulfill { body } => {
                    debug!(url = %request_url, "Fulfilling environment probe");
                    match FulfillRequestParams::builder()
                        .request_id(event.request_id.clone())
                        .response_code(200)
                        .response_header(HeaderEntry::new("Content-Type", "application/json"))
                        .response_header(HeaderEntry::new("Access-Control-Allow-Origin", "*"))
                        .body(BASE64.encode(body))
                        .build()
                    {
                        Ok(params) => intercept_page.execute(params).await.map(|_| ()),
                        Err(e) => {
                            warn!("Failed to build fulfil params: {e}");
                            intercept_page
                                .execute(ContinueRequestParams::new(event.request_id.clone()))
                                .await
                                .map(|_| ())
                        }
                    }
                }
                InterceptAction::Block => {
                    debug!(url = %request_url, "Blocking verification widget");
                    intercept_page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                }
                InterceptAction::ContinueFlagged => {
                    warn!(url = %request_url, "Challenge script requested");
                    intercept_state.flagged.lock().await.push(request_url.clone());
                    intercept_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                }
                InterceptAction::Continue => intercept_page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = outcome {
                debug!(url = %request_url, "Interception reply failed: {e}");
            }
        }
    });

    Ok(vec![response_task, intercept_task])
}

/// Pull the bodies of every accepted response out of the browser.
async fn collect_bodies(page: &Page, state: &VisitState) -> Vec<CapturedResource> {
    let pending = state.buffer.lock().await.drain();
    let mut resources = Vec::with_capacity(pending.len());

    for response in pending {
        let params = GetResponseBodyParams::new(RequestId::new(response.request_id.clone()));
        let reply = match tokio::time::timeout(Duration::from_secs(10), page.execute(params)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                debug!(url = %response.url, "Response body unavailable: {e}");
                continue;
            }
            Err(_) => {
                debug!(url = %response.url, "Timed out reading response body");
                continue;
            }
        };

        let body = if reply.result.base64_encoded {
            match BASE64.decode(reply.result.body.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(url = %response.url, "Undecodable response body: {e}");
                    continue;
                }
            }
        } else {
            reply.result.body.clone().into_bytes()
        };

        resources.push(CapturedResource {
            url: response.url,
            content_type: response.mime_type,
            body,
        });
    }

    resources
}
