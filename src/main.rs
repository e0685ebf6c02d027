// src/main.rs
// =============================================================================
// This is the entry point of our application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing, written to stderr so stdout stays clean)
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = success, 1 = some pages failed, 2 = error)
//
// Rust concepts used:
// - async/await: page captures and the HTTP server run on tokio
// - Arc<dyn Trait>: the crawler only knows about "some browser launcher"
// - match: Pattern matching to handle different subcommands
// =============================================================================

// Module declarations - tells Rust about our other source files
mod capture; // src/capture/ - loading and screenshotting a single page
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - crawl and browser settings
mod crawl; // src/crawl/ - the breadth-first crawl itself
mod engine; // src/engine/ - browser abstraction + Chromium backend
mod error; // src/error.rs - crawl error taxonomy
mod events; // src/events/ - event records and the broadcaster
mod server; // src/server.rs - HTTP + SSE transport

use clap::Parser; // Parser trait enables the parse() method
use cli::{Cli, Commands};
use config::CrawlConfig;
use crawl::{CrawlReport, Crawler};
use engine::{ChromeLauncher, EngineLauncher};
use events::{Broadcaster, WriterObserver};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=snapcrawl=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // If an unexpected error occurred, print it and exit with code 2
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = everything captured
//   Ok(1) = at least one page failed
//   Ok(2) = the run never started (bad seed, browser would not launch)
//   Err   = unexpected error
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, crawl } => {
            let config = CrawlConfig::from(crawl);
            config.validate()?;
            handle_serve(SocketAddr::new(host, port), config).await
        }
        Commands::Crawl { url, crawl } => {
            let config = CrawlConfig::from(crawl);
            config.validate()?;
            handle_crawl(&url, config).await
        }
        Commands::Snapshot { url, output, crawl } => {
            let config = CrawlConfig::from(crawl);
            config.validate()?;
            handle_snapshot(&url, output.as_deref(), config).await
        }
    }
}

fn launcher_for(config: &CrawlConfig) -> Arc<dyn EngineLauncher> {
    Arc::new(ChromeLauncher::new(config.browser.clone()))
}

async fn handle_serve(addr: SocketAddr, config: CrawlConfig) -> Result<i32> {
    let state = server::AppState {
        broadcaster: Broadcaster::new(),
        launcher: launcher_for(&config),
        config: Arc::new(config),
    };
    server::serve(addr, state).await?;
    Ok(0)
}

// Handles the 'crawl' subcommand
//
// Event records go to stdout exactly as an SSE client would see them; the
// human-readable summary goes to stderr.
async fn handle_crawl(url: &str, config: CrawlConfig) -> Result<i32> {
    eprintln!("🔍 Crawling website: {}", url);
    eprintln!(
        "📊 Max pages: {}, concurrency: {}",
        config.max_pages, config.max_concurrent
    );

    let launcher = launcher_for(&config);
    let crawler = Crawler::new(config, launcher, Broadcaster::new());
    let stdout = crawler
        .broadcaster()
        .subscribe(WriterObserver::new(std::io::stdout()));

    let report = crawler.start_crawling(url).await;
    crawler.broadcaster().unsubscribe(stdout);

    print_summary(&report);

    if report.error.is_some() {
        Ok(2)
    } else if report.is_clean() {
        Ok(0)
    } else {
        Ok(1)
    }
}

// Handles the 'snapshot' subcommand
//
// With --output the raw image is written to that file, otherwise the same
// JSON body the HTTP route returns is printed to stdout.
async fn handle_snapshot(url: &str, output: Option<&Path>, config: CrawlConfig) -> Result<i32> {
    let launcher = launcher_for(&config);

    let artifact = match capture::snapshot(launcher.as_ref(), url, &config.capture).await {
        Ok(artifact) => artifact,
        Err(e) => {
            eprintln!("❌ {}", e);
            return Ok(if e.is_fatal() { 2 } else { 1 });
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &artifact.image)
                .with_context(|| format!("could not write {}", path.display()))?;
            eprintln!(
                "📸 Saved {} ({} bytes) to {}",
                artifact.url,
                artifact.image.len(),
                path.display()
            );
        }
        None => {
            let body = serde_json::json!({
                "message": "Screenshot captured",
                "url": artifact.url,
                "screenshot": artifact.data_uri(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(0)
}

fn print_summary(report: &CrawlReport) {
    eprintln!();

    if let Some(error) = &report.error {
        eprintln!("⚠️  Crawl did not start: {}", error);
        return;
    }

    for (depth, pages) in &report.pages_by_depth {
        eprintln!("   depth {}: {} page(s)", depth, pages.len());
    }

    eprintln!("📊 Summary:");
    eprintln!("   📋 Visited: {}", report.visited);
    eprintln!("   📸 Captured: {}", report.captured);
    eprintln!("   ❌ Failed: {}", report.failed);
    if report.reached_page_cap {
        eprintln!("   🛑 Stopped at the page limit");
    }
}
