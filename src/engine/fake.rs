// src/engine/fake.rs
// =============================================================================
// An in-memory browser for tests.
//
// Pages are plain HTML strings keyed by URL. Link extraction parses that HTML
// with `scraper`, so tests describe sites the way a browser would see them.
// Every navigation start and page close is appended to a shared trace, which is
// what the ordering and dedup tests assert on.
// =============================================================================

use super::{EngineLauncher, RenderEngine, RenderPage, WaitUntil};
use crate::capture::overlay::dismissal_script;
use crate::capture::LINK_EXTRACTION_SCRIPT;
use crate::config::ImageOptions;
use anyhow::{bail, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FAKE_JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Navigate(String),
    Close(String),
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    html: String,
    delay: Duration,
    idle_delay: Duration,
    fail_capture: bool,
    empty_image: bool,
    fail_overlay: bool,
}

impl FakePage {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    /// A page linking to each of `hrefs`
    pub fn links(hrefs: &[&str]) -> Self {
        let anchors: String = hrefs
            .iter()
            .map(|href| format!(r#"<a href="{}">link</a>"#, href))
            .collect();
        Self::html(format!("<html><body>{}</body></html>", anchors))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    pub fn with_empty_image(mut self) -> Self {
        self.empty_image = true;
        self
    }

    pub fn failing_overlay_script(mut self) -> Self {
        self.fail_overlay = true;
        self
    }
}

#[derive(Default)]
pub struct FakeEngineBuilder {
    pages: HashMap<String, FakePage>,
}

impl FakeEngineBuilder {
    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn build(self) -> Arc<FakeEngine> {
        Arc::new(FakeEngine {
            pages: Arc::new(self.pages),
            state: Arc::new(SharedState::default()),
        })
    }
}

#[derive(Default)]
struct SharedState {
    trace: Mutex<Vec<TraceEvent>>,
    scripts: Mutex<Vec<String>>,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    shutdowns: AtomicUsize,
    shut_down: AtomicBool,
}

pub struct FakeEngine {
    pages: Arc<HashMap<String, FakePage>>,
    state: Arc<SharedState>,
}

impl FakeEngine {
    pub fn builder() -> FakeEngineBuilder {
        FakeEngineBuilder::default()
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.state.trace.lock().unwrap().clone()
    }

    /// URLs in the order their navigation started
    pub fn navigations(&self) -> Vec<String> {
        self.trace()
            .into_iter()
            .filter_map(|event| match event {
                TraceEvent::Navigate(url) => Some(url),
                TraceEvent::Close(_) => None,
            })
            .collect()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state.scripts.lock().unwrap().clone()
    }

    pub fn open_pages(&self) -> usize {
        self.state.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of pages that were open at the same time
    pub fn max_open_pages(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.state.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn open_page(&self) -> Result<Box<dyn RenderPage>> {
        if self.state.shut_down.load(Ordering::SeqCst) {
            bail!("browser has already been shut down");
        }
        let open = self.state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakeTab {
            pages: Arc::clone(&self.pages),
            state: Arc::clone(&self.state),
            requested: None,
            current: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.state.shut_down.swap(true, Ordering::SeqCst) {
            self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FakeTab {
    pages: Arc<HashMap<String, FakePage>>,
    state: Arc<SharedState>,
    /// Last URL passed to navigate, even if it never loaded
    requested: Option<String>,
    current: Option<(String, FakePage)>,
}

impl FakeTab {
    fn record(&self, event: TraceEvent) {
        self.state.trace.lock().unwrap().push(event);
    }

    fn loaded(&self) -> Result<&(String, FakePage)> {
        match &self.current {
            Some(current) => Ok(current),
            None => bail!("no document loaded"),
        }
    }
}

#[async_trait]
impl RenderPage for FakeTab {
    async fn navigate(&mut self, url: &str, _wait_until: WaitUntil) -> Result<()> {
        self.record(TraceEvent::Navigate(url.to_string()));
        self.requested = Some(url.to_string());
        let Some(page) = self.pages.get(url).cloned() else {
            bail!("net::ERR_NAME_NOT_RESOLVED at {}", url);
        };
        tokio::time::sleep(page.delay).await;
        self.current = Some((url.to_string(), page));
        Ok(())
    }

    async fn wait_for(&mut self, _condition: WaitUntil) -> Result<()> {
        let delay = self.loaded()?.1.idle_delay;
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        self.state.scripts.lock().unwrap().push(script.to_string());
        let (_, page) = self.loaded()?;

        if script == LINK_EXTRACTION_SCRIPT {
            let document = Html::parse_document(&page.html);
            let selector = Selector::parse("a[href]").unwrap();
            let hrefs: Vec<serde_json::Value> = document
                .select(&selector)
                .filter_map(|element| element.value().attr("href"))
                .filter(|href| !href.is_empty())
                .map(|href| serde_json::Value::String(href.to_string()))
                .collect();
            return Ok(serde_json::Value::Array(hrefs));
        }

        if page.fail_overlay && script == dismissal_script() {
            bail!("Evaluation failed: TypeError: el.click is not a function");
        }

        Ok(serde_json::Value::Null)
    }

    async fn capture_image(&mut self, _options: &ImageOptions) -> Result<Vec<u8>> {
        let (_, page) = self.loaded()?;
        if page.fail_capture {
            bail!("Protocol error: Unable to capture screenshot");
        }
        if page.empty_image {
            return Ok(Vec::new());
        }
        Ok(FAKE_JPEG.to_vec())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let url = self.requested.clone().unwrap_or_default();
        self.record(TraceEvent::Close(url));
        self.state.open_now.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same fake engine for every launch, or fails to launch
pub struct FakeLauncher {
    engine: Option<Arc<FakeEngine>>,
    launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        Self {
            engine: Some(engine),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            engine: None,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.engine {
            Some(engine) => {
                engine.state.shut_down.store(false, Ordering::SeqCst);
                Ok(Arc::clone(engine) as Arc<dyn RenderEngine>)
            }
            None => bail!("Failed to launch chromium: executable not found"),
        }
    }
}
