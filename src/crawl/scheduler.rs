// src/crawl/scheduler.rs
// =============================================================================
// The crawl scheduler: breadth-first traversal with a depth barrier.
//
// One control loop owns all crawl state (frontier, visited set, in-flight
// set, depth marker). Page captures run as futures inside a
// FuturesUnordered, so they overlap while waiting on the browser, but every
// state change happens back in the loop between two polls. No locks needed.
//
// The loop:
// 1. dispatch as many queued URLs as the admission rules allow
// 2. wait for any in-flight capture to finish
// 3. announce the result and feed discovered links into the frontier
// 4. repeat until nothing is queued and nothing is in flight
//
// Depth barrier: a URL at depth d+1 is only dispatched once every in-flight
// capture has finished, so each depth completes before the next one starts.
// =============================================================================

use super::links::{is_admissible, normalize, parse_seed};
use super::queue::{CrawlItem, Frontier};
use crate::capture::{capture, Capture, PageArtifact};
use crate::config::{CaptureOptions, CrawlConfig};
use crate::engine::{EngineLauncher, RenderEngine};
use crate::error::CrawlError;
use crate::events::{Broadcaster, CrawlEvent};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
    /// Nothing left to dispatch (queue empty or page cap hit), captures still running
    Draining,
    Completed,
}

/// Summary of one finished run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub seed: String,
    pub state: CrawlState,
    /// Distinct URLs admitted into the run, seed included
    pub visited: usize,
    pub captured: usize,
    pub failed: usize,
    pub reached_page_cap: bool,
    /// URLs captured successfully, grouped by depth in completion order
    pub pages_by_depth: BTreeMap<usize, Vec<String>>,
    /// Set when the run never started
    pub error: Option<String>,
}

impl CrawlReport {
    fn aborted(seed: &str, error: &CrawlError) -> Self {
        Self {
            seed: seed.to_string(),
            state: CrawlState::Completed,
            visited: 0,
            captured: 0,
            failed: 0,
            reached_page_cap: false,
            pages_by_depth: BTreeMap::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

pub struct Crawler {
    config: CrawlConfig,
    launcher: Arc<dyn EngineLauncher>,
    broadcaster: Broadcaster,
}

impl Crawler {
    pub fn new(config: CrawlConfig, launcher: Arc<dyn EngineLauncher>, broadcaster: Broadcaster) -> Self {
        Self {
            config,
            launcher,
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    // Crawls everything reachable from `seed` and returns once the run is
    // complete
    //
    // Each call is an independent session: fresh frontier, fresh browser.
    // An unparsable seed or a browser that won't start produces a single
    // `error` event and an immediately completed run.
    pub async fn start_crawling(&self, seed: &str) -> CrawlReport {
        let seed_url = match parse_seed(seed) {
            Ok(url) => url,
            Err(reason) => {
                let error = CrawlError::InvalidSeedUrl(reason);
                tracing::warn!("Rejected crawl seed '{}': {}", seed, error);
                self.broadcaster.broadcast(&CrawlEvent::error(error.to_string()));
                return CrawlReport::aborted(seed, &error);
            }
        };

        let engine = match self.launcher.launch().await {
            Ok(engine) => engine,
            Err(e) => {
                let error = CrawlError::EngineLaunch(format!("{:#}", e));
                tracing::error!("{}", error);
                self.broadcaster.broadcast(&CrawlEvent::error(error.to_string()));
                return CrawlReport::aborted(seed, &error);
            }
        };

        let domain = seed_url.host_str().unwrap_or_default().to_string();
        tracing::info!("Starting crawl of {} (domain {})", seed_url, domain);

        let mut session = CrawlSession {
            seed: seed_url.to_string(),
            domain,
            frontier: Frontier::new(self.config.max_pages),
            in_flight: HashSet::new(),
            current_depth: 0,
            pages_by_depth: BTreeMap::new(),
            engine: Some(engine),
            state: CrawlState::Idle,
            max_concurrent: self.config.max_concurrent.max(1),
            capture: self.config.capture,
            broadcaster: self.broadcaster.clone(),
            dispatched: 0,
            captured: 0,
            failed: 0,
        };
        session.run().await;
        session.report()
    }
}

type CaptureTask = BoxFuture<'static, (CrawlItem, Result<Capture, CrawlError>)>;

struct CrawlSession {
    seed: String,
    domain: String,
    frontier: Frontier,
    in_flight: HashSet<String>,
    current_depth: usize,
    pages_by_depth: BTreeMap<usize, Vec<String>>,
    engine: Option<Arc<dyn RenderEngine>>,
    state: CrawlState,
    max_concurrent: usize,
    capture: CaptureOptions,
    broadcaster: Broadcaster,
    dispatched: usize,
    captured: usize,
    failed: usize,
}

impl CrawlSession {
    async fn run(&mut self) {
        self.transition(CrawlState::Running);
        self.frontier.admit(self.seed.clone(), 0);

        let mut tasks: FuturesUnordered<CaptureTask> = FuturesUnordered::new();
        loop {
            self.dispatch(&mut tasks);
            match tasks.next().await {
                Some((item, outcome)) => self.finish(item, outcome),
                // nothing running and nothing dispatchable: either the queue
                // is empty or the page cap holds the rest back
                None => break,
            }
        }

        let message = if self.frontier.is_capped() {
            "Crawling completed (reached maximum page limit)"
        } else {
            "Crawling completed"
        };
        self.emit(CrawlEvent::info(message));
        self.teardown().await;
        self.transition(CrawlState::Completed);
    }

    fn dispatch(&mut self, tasks: &mut FuturesUnordered<CaptureTask>) {
        while tasks.len() < self.max_concurrent {
            // past the page cap nothing new starts, except the seed itself
            if self.frontier.is_capped() && self.dispatched > 0 {
                break;
            }
            let Some(item) = self.frontier.pop_front() else {
                break;
            };

            if item.depth > self.current_depth {
                if !tasks.is_empty() {
                    // depth barrier: wait for the current level to drain
                    self.frontier.push_front(item);
                    break;
                }
                self.current_depth = item.depth;
                self.emit(CrawlEvent::info(format!("Processing depth {}", item.depth)));
            }

            if !self.in_flight.insert(item.url.clone()) {
                tracing::debug!("Skipping {}, already in flight", item.url);
                continue;
            }

            tracing::debug!(depth = item.depth, "Dispatching {}", item.url);
            self.emit(CrawlEvent::info(format!("Crawling: {}", item.url)));
            self.dispatched += 1;
            tasks.push(capture_task(self.engine.clone(), item, self.capture));
        }

        if !tasks.is_empty() {
            if self.frontier.is_empty() || self.frontier.is_capped() {
                self.transition(CrawlState::Draining);
            } else {
                self.transition(CrawlState::Running);
            }
        }
    }

    fn finish(&mut self, item: CrawlItem, outcome: Result<Capture, CrawlError>) {
        self.in_flight.remove(&item.url);

        match outcome {
            Ok(capture) => {
                self.captured += 1;
                let artifact = PageArtifact {
                    url: item.url.clone(),
                    depth: item.depth,
                    image: capture.image,
                    mime_type: self.capture.image.format.mime_type(),
                };
                tracing::info!(
                    depth = artifact.depth,
                    bytes = artifact.image.len(),
                    "Captured {}",
                    artifact.url
                );
                self.emit(CrawlEvent::Screenshot {
                    url: artifact.url.clone(),
                    data: artifact.data_uri(),
                });

                self.pages_by_depth
                    .entry(item.depth)
                    .or_default()
                    .push(item.url.clone());
                self.emit(CrawlEvent::Depth {
                    depth: item.depth,
                    url: item.url.clone(),
                });

                self.discover(&item, &capture.links);
            }
            Err(e) => {
                self.failed += 1;
                tracing::warn!("Error processing {}: {}", item.url, e);
                self.emit(CrawlEvent::error(format!(
                    "Error processing {}: {}",
                    item.url,
                    e.detail()
                )));
            }
        }
    }

    // Feeds the links found on `item` into the frontier one depth deeper
    fn discover(&mut self, item: &CrawlItem, links: &[String]) {
        for raw in links {
            if self.frontier.is_capped() {
                tracing::debug!("Page cap reached, ignoring remaining links on {}", item.url);
                break;
            }

            let Some(url) = normalize(raw, &item.url) else {
                continue;
            };
            if !is_admissible(&url, &self.domain) {
                continue;
            }

            let depth = item.depth + 1;
            if let Some(total) = self.frontier.admit(url.clone(), depth) {
                self.emit(CrawlEvent::Link { url, depth, total });
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Err(e) = engine.shutdown().await {
                tracing::warn!("Error during browser cleanup: {}", e);
            }
        }
    }

    fn transition(&mut self, next: CrawlState) {
        if self.state != next {
            tracing::debug!("crawl state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn emit(&self, event: CrawlEvent) {
        self.broadcaster.broadcast(&event);
    }

    fn report(&self) -> CrawlReport {
        CrawlReport {
            seed: self.seed.clone(),
            state: self.state,
            visited: self.frontier.visited_count(),
            captured: self.captured,
            failed: self.failed,
            reached_page_cap: self.frontier.is_capped(),
            pages_by_depth: self.pages_by_depth.clone(),
            error: None,
        }
    }
}

fn capture_task(
    engine: Option<Arc<dyn RenderEngine>>,
    item: CrawlItem,
    options: CaptureOptions,
) -> CaptureTask {
    Box::pin(async move {
        let outcome = match engine {
            Some(engine) => capture(engine.as_ref(), &item.url, &options).await,
            None => Err(CrawlError::EngineUninitialized),
        };
        (item, outcome)
    })
}
