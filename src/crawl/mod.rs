// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from a seed URL, one depth at a time
// - Same-hostname restriction (doesn't crawl external sites)
// - Only document-like paths enter the frontier
// - At most `max_concurrent` pages in flight, at most `max_pages` per run
//
// Submodules:
// - links: URL normalization and admission rules
// - queue: the frontier and visited set
// - scheduler: the crawl loop itself
// =============================================================================

mod links;
mod queue;
mod scheduler;

pub use scheduler::{CrawlReport, Crawler};
