//! Shared headless Chromium instance with per-visit isolated contexts.

use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::constants::CAPTURE_USER_AGENT;

/// Manages a headless browser that is launched on first use.
///
/// Every visit gets its own browser context so cookies, storage and cache
/// never leak between pages or snapshots.
pub struct BrowserService {
    config: Arc<Config>,
    browser: Arc<Mutex<Option<Browser>>>,
}

/// A page opened inside its own browser context.
pub struct IsolatedPage {
    pub page: Page,
    context_id: BrowserContextId,
}

impl BrowserService {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Launch the browser if not already running.
    async fn ensure_browser(&self) -> Result<()> {
        let mut browser_guard = self.browser.lock().await;
        if browser_guard.is_some() {
            return Ok(());
        }

        info!("Launching headless browser for page capture");

        let mut config_builder = BrowserConfig::builder()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .request_timeout(self.config.nav_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--mute-audio")
            .arg("--hide-scrollbars")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={CAPTURE_USER_AGENT}"));

        if let Some(ref chrome_path) = self.config.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        *browser_guard = Some(browser);
        info!("Headless browser ready");

        Ok(())
    }

    /// Open a blank page in a fresh browser context.
    ///
    /// The browser lock is held only while the context and target are
    /// created, so several visits can run side by side.
    pub async fn open_isolated(&self) -> Result<IsolatedPage> {
        self.ensure_browser().await?;

        let browser_guard = self.browser.lock().await;
        let browser = browser_guard.as_ref().context("Browser not initialized")?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build target params: {e}"))?;

        let page = match browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(dispose_err) = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    warn!("Failed to dispose browser context: {dispose_err}");
                }
                return Err(anyhow::Error::new(e).context("Failed to open page"));
            }
        };

        Ok(IsolatedPage { page, context_id })
    }

    /// Close the page and throw away its browser context.
    pub async fn release(&self, isolated: IsolatedPage) {
        if let Err(e) = isolated.page.close().await {
            debug!("Failed to close page: {e}");
        }

        let browser_guard = self.browser.lock().await;
        if let Some(browser) = browser_guard.as_ref() {
            if let Err(e) = browser
                .execute(DisposeBrowserContextParams::new(isolated.context_id))
                .await
            {
                warn!("Failed to dispose browser context: {e}");
            }
        }
    }

    /// Shutdown the browser gracefully.
    pub async fn shutdown(&self) {
        let mut browser_guard = self.browser.lock().await;
        if let Some(mut browser) = browser_guard.take() {
            if let Err(e) = browser.close().await {
                error!("Failed to close browser: {e}");
            } else {
                info!("Browser shutdown complete");
            }
        }
    }
}
