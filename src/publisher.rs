// Fan-out of produced samples: series store (memory + durable) and observer broadcast.

use crate::models::{Event, EventKind, EventLevel, Sample, now_ms};
use crate::series::SeriesStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Rate limit for the "no receivers" note (nobody subscribed is the normal headless case).
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct Publisher {
    store: Arc<SeriesStore>,
    tx: broadcast::Sender<Sample>,
    published_total: AtomicU64,
    last_no_receivers_log: Mutex<Option<Instant>>,
}

impl Publisher {
    pub fn new(store: Arc<SeriesStore>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            store,
            tx,
            published_total: AtomicU64::new(0),
            last_no_receivers_log: Mutex::new(None),
        }
    }

    /// Append to the store, then notify subscribers. Never blocks.
    pub fn publish(&self, sample: Sample) {
        self.store.append(sample.clone());
        self.published_total.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(sample).is_err() {
            let mut last = self
                .last_no_receivers_log
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL) {
                tracing::debug!(
                    operation = "broadcast_sample",
                    "No subscribers; broadcast channel has no receivers"
                );
                *last = Some(Instant::now());
            }
        }
    }

    /// Record an audit-trail event and mirror it to the tracing log.
    pub fn event(&self, kind: EventKind, level: EventLevel, message: impl Into<String>) {
        let event = Event::new(now_ms(), kind, level, message);
        match level {
            EventLevel::Info => tracing::info!(event = kind.as_str(), "{}", event.message),
            EventLevel::Warning => tracing::warn!(event = kind.as_str(), "{}", event.message),
            EventLevel::Error => tracing::error!(event = kind.as_str(), "{}", event.message),
        }
        self.publish(Sample::Event(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Sample> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<Sample> {
        self.tx.clone()
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    pub fn published_total(&self) -> u64 {
        self.published_total.load(Ordering::Relaxed)
    }
}
