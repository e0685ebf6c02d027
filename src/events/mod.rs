// src/events/mod.rs
// =============================================================================
// Progress events and their wire format.
//
// Every event becomes one server-push text record:
//
//   data: {"type":"link","data":{"url":"...","depth":1,"total":2}}\n\n
//
// The `type` tag picks the payload shape:
// - info / error  -> plain string
// - link          -> {url, depth, total}
// - depth         -> {depth, url}
// - screenshot    -> {url, data} where data is a data:image/jpeg;base64 URI
// =============================================================================

mod broadcast;

pub use broadcast::{Broadcaster, WriterObserver};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum CrawlEvent {
    /// Human-readable status line
    Info(String),
    /// A new URL entered the frontier
    Link { url: String, depth: usize, total: usize },
    /// A URL finished processing at the given depth
    Depth { depth: usize, url: String },
    /// Captured image for a URL, as a data URI
    Screenshot { url: String, data: String },
    /// A URL (or the whole run) failed
    Error(String),
}

impl CrawlEvent {
    pub fn info(message: impl Into<String>) -> Self {
        CrawlEvent::Info(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        CrawlEvent::Error(message.into())
    }

    /// The value of the `type` tag on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlEvent::Info(_) => "info",
            CrawlEvent::Link { .. } => "link",
            CrawlEvent::Depth { .. } => "depth",
            CrawlEvent::Screenshot { .. } => "screenshot",
            CrawlEvent::Error(_) => "error",
        }
    }

    /// Formats the event as a `data: ...\n\n` record
    pub fn to_record(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("data: {}\n\n", json))
    }

    /// Inverse of `to_record`
    #[cfg(test)]
    pub fn from_record(record: &str) -> Option<Self> {
        let json = record.trim_end().strip_prefix("data: ")?;
        serde_json::from_str(json).ok()
    }
}

/// Encodes image bytes as a `data:<mime>;base64,...` URI
pub fn image_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime_type, encoded)
}
