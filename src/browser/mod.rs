//! Headless browser lifecycle.
//!
//! One [`BrowserSession`] owns the Chromium process, its CDP handler loop and
//! a single page. Every navigation in the crawl goes through this one owner,
//! which is what keeps the "single page, strictly sequential" model honest
//! without any locking.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::CrawlError;

struct ActiveSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

/// Two-phase browser lifecycle: nothing is launched until `start()`, and
/// `stop()` releases everything unconditionally.
pub struct BrowserSession {
    nav_timeout: Duration,
    active: Option<ActiveSession>,
}

impl BrowserSession {
    pub fn new(nav_timeout_ms: u64) -> Self {
        Self {
            nav_timeout: Duration::from_millis(nav_timeout_ms),
            active: None,
        }
    }

    /// Launch headless Chromium and open the crawl page.
    ///
    /// A no-op when a session is already active.
    pub async fn start(&mut self) -> Result<(), CrawlError> {
        if self.active.is_some() {
            return Ok(());
        }

        let config = BrowserConfig::builder()
            .build()
            .map_err(CrawlError::BrowserUnavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::BrowserUnavailable(e.to_string()))?;

        // The CDP event loop must be polled for the lifetime of the browser.
        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(CrawlError::BrowserUnavailable(e.to_string()));
            }
        };

        debug!("Browser session started");
        self.active = Some(ActiveSession {
            browser,
            page,
            handler_task,
        });
        Ok(())
    }

    /// Release the browser. Idempotent: calling it with no active session is
    /// a no-op, not an error.
    pub async fn stop(&mut self) {
        let Some(mut session) = self.active.take() else {
            return;
        };

        if let Err(e) = session.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        let _ = session.browser.wait().await;
        session.handler_task.abort();
        debug!("Browser session stopped");
    }

    /// Navigate the page to `url`, wait for the load lifecycle within the
    /// canonical timeout and return the rendered HTML.
    pub async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let session = self.active.as_ref().ok_or(CrawlError::SessionNotInitialized)?;

        let load = async {
            session.page.goto(url).await?;
            session.page.wait_for_navigation().await?;
            session.page.content().await
        };

        match tokio::time::timeout(self.nav_timeout, load).await {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => Err(CrawlError::Cdp(e)),
            Err(_) => Err(CrawlError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: self.nav_timeout.as_millis() as u64,
            }),
        }
    }
}
