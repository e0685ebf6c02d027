// src/engine/chrome.rs
// =============================================================================
// Headless Chromium over the DevTools protocol (chromiumoxide).
//
// chromiumoxide splits a browser into two halves:
// - Browser: the handle we send commands through
// - Handler: a stream of protocol messages that must be polled constantly
//
// The handler gets its own tokio task for the lifetime of the engine and is
// aborted when the engine shuts down.
// =============================================================================

use super::{EngineLauncher, RenderEngine, RenderPage, WaitUntil};
use crate::config::{BrowserOptions, ImageFormat, ImageOptions};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Flags that keep Chromium usable inside containers and serverless hosts
const LAUNCH_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
    "--no-first-run",
    "--no-zygote",
];

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the resource count must stay flat to call the network idle
const IDLE_QUIET_PERIOD: Duration = Duration::from_millis(500);

const READY_STATE_SCRIPT: &str = "(() => ({ \
     readyState: document.readyState, \
     href: location.href, \
     resources: performance.getEntriesByType('resource').length \
 }))()";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentState {
    ready_state: String,
    href: String,
    resources: u64,
}

pub struct ChromeLauncher {
    options: BrowserOptions,
}

impl ChromeLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let viewport = self.options.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .viewport(Viewport {
                width: viewport.width,
                height: viewport.height,
                ..Viewport::default()
            });

        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        if !self.options.headless {
            builder = builder.with_head();
        }
        if !self.options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| anyhow!(e))
    }
}

#[async_trait]
impl EngineLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>> {
        let config = self.browser_config()?;
        tracing::info!("Starting browser...");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("could not start Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(message) = handler.next().await {
                if let Err(e) = message {
                    tracing::debug!("browser handler error: {}", e);
                }
            }
        });

        Ok(Arc::new(ChromeEngine {
            browser: Mutex::new(Some(browser)),
            handler_task: std::sync::Mutex::new(Some(handler_task)),
        }))
    }
}

pub struct ChromeEngine {
    browser: Mutex<Option<Browser>>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn open_page(&self) -> Result<Box<dyn RenderPage>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| anyhow!("browser has already been shut down"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("could not open a new page")?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser.close().await.context("could not close browser");
        if let Err(e) = browser.wait().await {
            tracing::warn!("Error waiting for browser process to exit: {}", e);
        }

        let handler_task = self
            .handler_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = handler_task {
            task.abort();
        }

        closed.map(|_| ())
    }
}

struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn document_state(&self) -> Result<DocumentState> {
        let result = self.page.evaluate(READY_STATE_SCRIPT).await?;
        let value = result
            .value()
            .cloned()
            .ok_or_else(|| anyhow!("readiness probe returned nothing"))?;
        Ok(serde_json::from_value(value)?)
    }

    // Polls until the document reaches the requested milestone; the caller
    // bounds this with a timeout.
    async fn poll_until(&self, condition: WaitUntil) -> Result<()> {
        let mut last_resources = None;
        let mut quiet_since = tokio::time::Instant::now();

        loop {
            let state = self.document_state().await?;
            let navigated = state.href != "about:blank";

            let reached = match condition {
                WaitUntil::DomContentLoaded => navigated && state.ready_state != "loading",
                WaitUntil::NetworkIdle => {
                    if last_resources != Some(state.resources) {
                        last_resources = Some(state.resources);
                        quiet_since = tokio::time::Instant::now();
                    }
                    state.ready_state == "complete" && quiet_since.elapsed() >= IDLE_QUIET_PERIOD
                }
            };

            if reached {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RenderPage for ChromePage {
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<()> {
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .with_context(|| format!("Failed to load URL {}", url))?;

        if let Some(error_text) = &response.result.error_text {
            bail!("Failed to load URL {}: {}", url, error_text);
        }

        self.poll_until(wait_until).await
    }

    async fn wait_for(&mut self, condition: WaitUntil) -> Result<()> {
        self.poll_until(condition).await
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn capture_image(&mut self, options: &ImageOptions) -> Result<Vec<u8>> {
        let format = match options.format {
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        };
        let params = ScreenshotParams::builder()
            .format(format)
            .quality(i64::from(options.quality))
            .full_page(options.full_page)
            .build();

        self.page
            .screenshot(params)
            .await
            .context("Failed to capture screenshot")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
