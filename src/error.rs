// src/error.rs
// =============================================================================
// Error types for a crawl run.
//
// Only InvalidSeedUrl and EngineLaunch stop a whole run. Everything else is
// scoped to one URL or one observer and gets turned into an `error` event
// (or a silent unsubscribe) by whoever catches it.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The seed could not be parsed as an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidSeedUrl(String),

    /// Navigation failed or exceeded the navigation timeout
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Link extraction, scrolling, or image capture failed
    #[error("capture of {url} failed: {reason}")]
    Capture { url: String, reason: String },

    /// An observer refused a record
    #[error("observer delivery failed: {0}")]
    ObserverDelivery(String),

    /// A page was dispatched after the browser was torn down
    #[error("Browser not initialized")]
    EngineUninitialized,

    /// The browser could not be started
    #[error("failed to launch browser: {0}")]
    EngineLaunch(String),
}

impl CrawlError {
    /// True for errors that abort the whole crawl rather than one URL
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::InvalidSeedUrl(_) | CrawlError::EngineLaunch(_))
    }

    /// The message without the URL, for callers that already name it
    pub fn detail(&self) -> String {
        match self {
            CrawlError::Navigation { reason, .. } | CrawlError::Capture { reason, .. } => {
                reason.clone()
            }
            other => other.to_string(),
        }
    }
}
