// src/events/broadcast.rs
// =============================================================================
// Fans crawl events out to every subscribed observer.
//
// The subscriber set is owned by a Broadcaster handle that gets passed to the
// crawler and the HTTP layer explicitly. Cloning the handle shares the same
// set.
//
// Delivery rules:
// - each event is formatted into a record once, then handed to each observer
// - an observer that fails is removed; the others still get the record
// =============================================================================

use super::CrawlEvent;
use crate::error::CrawlError;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Sender, UnboundedSender};

/// Anything that can accept a serialized event record
pub trait Observer: Send {
    fn deliver(&mut self, record: &str) -> Result<(), CrawlError>;
}

// A streaming HTTP response is fed through a bounded channel. A client that
// stops reading fills its buffer and gets dropped, same as one that went away.
impl Observer for Sender<String> {
    fn deliver(&mut self, record: &str) -> Result<(), CrawlError> {
        self.try_send(record.to_owned()).map_err(|e| match e {
            TrySendError::Full(_) => {
                CrawlError::ObserverDelivery("subscriber buffer is full".to_string())
            }
            TrySendError::Closed(_) => CrawlError::ObserverDelivery("receiver closed".to_string()),
        })
    }
}

impl Observer for UnboundedSender<String> {
    fn deliver(&mut self, record: &str) -> Result<(), CrawlError> {
        self.send(record.to_owned())
            .map_err(|_| CrawlError::ObserverDelivery("receiver closed".to_string()))
    }
}

/// Writes records to any `Write`, e.g. stdout for the `crawl` command
pub struct WriterObserver<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> Observer for WriterObserver<W> {
    fn deliver(&mut self, record: &str) -> Result<(), CrawlError> {
        self.writer
            .write_all(record.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| CrawlError::ObserverDelivery(e.to_string()))
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    observers: BTreeMap<SubscriberId, Box<dyn Observer>>,
}

#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<Subscribers>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: impl Observer + 'static) -> SubscriberId {
        let mut subscribers = self.lock();
        let id = SubscriberId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.observers.insert(id, Box::new(observer));
        tracing::debug!(subscriber = id.0, "observer subscribed");
        id
    }

    /// Returns false if the observer was already gone
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.lock().observers.remove(&id).is_some()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.lock().observers.len()
    }

    // Sends one event to every observer
    //
    // Returns how many observers accepted it. Observers that fail are
    // unsubscribed on the spot.
    pub fn broadcast(&self, event: &CrawlEvent) -> usize {
        let record = match event.to_record() {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Failed to serialize {} event: {}", event.kind(), e);
                return 0;
            }
        };

        let mut subscribers = self.lock();
        let mut failed = Vec::new();
        for (id, observer) in subscribers.observers.iter_mut() {
            if let Err(e) = observer.deliver(&record) {
                tracing::warn!(subscriber = id.0, "Error sending SSE update: {}", e);
                failed.push(*id);
            }
        }
        for id in &failed {
            subscribers.observers.remove(id);
        }
        subscribers.observers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // A panic inside an observer must not take the whole stream down
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
