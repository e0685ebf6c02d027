// src/engine/mod.rs
// =============================================================================
// The rendering engine as the crawler sees it.
//
// The crawler never talks to a browser directly. It only needs to:
// - launch one engine per crawl session and shut it down at the end
// - open an isolated page, navigate it, run a script, take a picture, close it
//
// Timeouts are not part of these traits. Callers wrap the futures in
// tokio::time::timeout so every implementation behaves the same way.
// =============================================================================

mod chrome;
#[cfg(test)]
pub mod fake;

pub use chrome::ChromeLauncher;

use crate::config::ImageOptions;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Lifecycle milestones a page can be waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The document has been parsed; subresources may still be loading
    DomContentLoaded,
    /// No network activity for a short quiet period
    NetworkIdle,
}

/// Starts a fresh engine for one crawl session
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>>;
}

/// One running browser instance
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn RenderPage>>;

    /// Releases the browser. Calling it twice is a no-op.
    async fn shutdown(&self) -> Result<()>;
}

/// An isolated page context
#[async_trait]
pub trait RenderPage: Send {
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<()>;

    async fn wait_for(&mut self, condition: WaitUntil) -> Result<()>;

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    async fn capture_image(&mut self, options: &ImageOptions) -> Result<Vec<u8>>;

    async fn close(self: Box<Self>) -> Result<()>;
}
