// src/config.rs
// =============================================================================
// Named options for a crawl session.
//
// Defaults: 3 pages in flight, at most 100 pages per run, 30s to load a page,
// 5s to let it settle, and a 1280x720 viewport captured as JPEG at quality 80.
// =============================================================================

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_IDLE_WAIT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// How many pages may be captured at the same time
    pub max_concurrent: usize,
    /// Ceiling on distinct URLs admitted into one run (seed included)
    pub max_pages: usize,
    pub capture: CaptureOptions,
    pub browser: BrowserOptions,
}

/// Settings for driving a single page through the capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub navigation_timeout: Duration,
    pub idle_wait_timeout: Duration,
    pub image: ImageOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub format: ImageFormat,
    /// Lossy encoding quality, 1..=100
    pub quality: u8,
    pub full_page: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// How the headless browser gets launched
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chromium binary to use instead of auto-detection
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Disabled in containers where the Chromium sandbox can't start
    pub sandbox: bool,
    pub viewport: Viewport,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_pages: DEFAULT_MAX_PAGES,
            capture: CaptureOptions::default(),
            browser: BrowserOptions::default(),
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            idle_wait_timeout: Duration::from_millis(DEFAULT_IDLE_WAIT_TIMEOUT_MS),
            image: ImageOptions::default(),
        }
    }
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            quality: DEFAULT_JPEG_QUALITY,
            full_page: true,
        }
    }
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: false,
            viewport: Viewport {
                width: DEFAULT_VIEWPORT_WIDTH,
                height: DEFAULT_VIEWPORT_HEIGHT,
            },
        }
    }
}

impl CrawlConfig {
    /// Rejects settings the scheduler can't run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max_concurrent must be at least 1");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        if !(1..=100).contains(&self.capture.image.quality) {
            bail!(
                "image quality must be between 1 and 100, got {}",
                self.capture.image.quality
            );
        }
        if self.browser.viewport.width == 0 || self.browser.viewport.height == 0 {
            bail!("viewport dimensions must be non-zero");
        }
        Ok(())
    }
}
