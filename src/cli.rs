// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Subcommands:
// - serve:    run the HTTP service (SSE stream + start-crawl endpoint)
// - crawl:    crawl one site and stream event records to stdout
// - snapshot: capture a single page
//
// Every subcommand shares the same crawl/browser flags (CrawlArgs), which
// turn into a CrawlConfig.
// =============================================================================

use crate::config::{
    BrowserOptions, CaptureOptions, CrawlConfig, ImageOptions, Viewport, DEFAULT_IDLE_WAIT_TIMEOUT_MS,
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_PAGES, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "snapcrawl",
    version,
    about = "Crawl a website breadth-first and capture a full-page screenshot of every page",
    long_about = "snapcrawl walks a website level by level, stays on the seed's hostname, \
                  and streams progress events (discovered links, screenshots, errors) as they happen."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service
    ///
    /// Example: snapcrawl serve --port 3000
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Crawl a website and print event records to stdout
    ///
    /// Example: snapcrawl crawl https://example.com --max-pages 20
    Crawl {
        /// Seed URL (e.g., https://example.com)
        url: String,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Capture a single page
    ///
    /// Example: snapcrawl snapshot https://example.com --output home.jpg
    Snapshot {
        /// Page to capture
        url: String,

        /// Write the image to this file instead of printing JSON
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        crawl: CrawlArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Pages captured at the same time
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT)]
    pub max_concurrent: usize,

    /// Maximum distinct pages per crawl (seed included)
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_NAVIGATION_TIMEOUT_MS)]
    pub navigation_timeout_ms: u64,

    /// How long to wait for the network to go quiet, in milliseconds
    #[arg(long, default_value_t = DEFAULT_IDLE_WAIT_TIMEOUT_MS)]
    pub idle_wait_timeout_ms: u64,

    #[arg(long, default_value_t = DEFAULT_VIEWPORT_WIDTH)]
    pub viewport_width: u32,

    #[arg(long, default_value_t = DEFAULT_VIEWPORT_HEIGHT)]
    pub viewport_height: u32,

    /// JPEG quality, 1-100
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    pub quality: u8,

    /// Chromium executable (auto-detected when omitted)
    #[arg(long, env = "CHROME_EXECUTABLE")]
    pub chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Keep Chromium's sandbox enabled
    #[arg(long)]
    pub sandbox: bool,
}

impl From<CrawlArgs> for CrawlConfig {
    fn from(args: CrawlArgs) -> Self {
        CrawlConfig {
            max_concurrent: args.max_concurrent,
            max_pages: args.max_pages,
            capture: CaptureOptions {
                navigation_timeout: Duration::from_millis(args.navigation_timeout_ms),
                idle_wait_timeout: Duration::from_millis(args.idle_wait_timeout_ms),
                image: ImageOptions {
                    quality: args.quality,
                    ..ImageOptions::default()
                },
            },
            browser: BrowserOptions {
                executable: args.chrome_path,
                headless: !args.headful,
                sandbox: args.sandbox,
                viewport: Viewport {
                    width: args.viewport_width,
                    height: args.viewport_height,
                },
            },
        }
    }
}
