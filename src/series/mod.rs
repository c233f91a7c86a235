// Series store: bounded in-memory windows per kind (live path) plus a batched SQLite writer (history path).
// The two paths are independent; a durable write failure never touches the live windows beyond
// recording a StorageWriteFailed event in memory.

mod window;

pub use window::RetentionWindow;

use crate::history_repo::HistoryRepo;
use crate::models::{Event, EventKind, EventLevel, Sample, SampleKind, now_ms};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, interval};

/// Channel capacity for the durable writer (samples are dropped and reported if it falls behind).
pub fn writer_channel_capacity(flush_rate: u64) -> usize {
    (flush_rate as usize * 4).max(256)
}

#[derive(Debug, Clone)]
pub struct SeriesConfig {
    pub window_secs: u64,
    pub max_window_samples: usize,
    pub flush_rate: u64,
    pub flush_interval_secs: u64,
}

/// One window per kind, shared with the writer task so it can record its own failures.
struct LiveWindows {
    windows: [Mutex<RetentionWindow>; 4],
    write_failures: AtomicU64,
    capped_total: AtomicU64,
}

impl LiveWindows {
    fn new(window_secs: u64, max_len: usize) -> Self {
        Self {
            windows: SampleKind::ALL.map(|_| Mutex::new(RetentionWindow::new(window_secs, max_len))),
            write_failures: AtomicU64::new(0),
            capped_total: AtomicU64::new(0),
        }
    }

    fn window(&self, kind: SampleKind) -> std::sync::MutexGuard<'_, RetentionWindow> {
        let idx = match kind {
            SampleKind::Network => 0,
            SampleKind::System => 1,
            SampleKind::Benchmark => 2,
            SampleKind::Event => 3,
        };
        self.windows[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, sample: Sample) {
        let kind = sample.kind();
        let capped = self.window(kind).push(sample) as u64;
        if capped > 0 && self.capped_total.fetch_add(capped, Ordering::Relaxed) == 0 {
            tracing::warn!(
                %kind,
                operation = "append",
                "max_window_samples reached; live window is shorter than window_secs"
            );
        }
    }

    /// Kept in memory only: persisting it would go through the path that just failed.
    fn record_write_failure(&self, message: String) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        self.push(Sample::Event(Event::new(
            now_ms(),
            EventKind::StorageWriteFailed,
            EventLevel::Error,
            message,
        )));
    }
}

pub struct SeriesStore {
    live: Arc<LiveWindows>,
    repo: Arc<HistoryRepo>,
    write_tx: mpsc::Sender<Sample>,
    saved_total: Arc<AtomicU64>,
    writer_closed_reported: AtomicBool,
}

impl SeriesStore {
    /// Build the store and spawn its durable writer. The writer drains, flushes and exits when
    /// `writer_shutdown_rx` flips to true.
    pub fn open(
        repo: Arc<HistoryRepo>,
        config: SeriesConfig,
        writer_shutdown_rx: watch::Receiver<bool>,
    ) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let live = Arc::new(LiveWindows::new(config.window_secs, config.max_window_samples));
        let saved_total = Arc::new(AtomicU64::new(0));
        let (write_tx, write_rx) = mpsc::channel(writer_channel_capacity(config.flush_rate));
        let writer = spawn_writer(
            write_rx,
            repo.clone(),
            live.clone(),
            WriterConfig {
                flush_rate: config.flush_rate.max(1),
                flush_interval_secs: config.flush_interval_secs.max(1),
            },
            saved_total.clone(),
            writer_shutdown_rx,
        );
        let store = Arc::new(Self {
            live,
            repo,
            write_tx,
            saved_total,
            writer_closed_reported: AtomicBool::new(false),
        });
        (store, writer)
    }

    /// Append to the live window, then hand off to the durable writer. Never blocks.
    pub fn append(&self, sample: Sample) {
        self.live.push(sample.clone());
        match self.write_tx.try_send(sample) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(sample)) => {
                tracing::warn!(
                    operation = "enqueue_durable",
                    kind = %sample.kind(),
                    "history writer queue full; sample not persisted"
                );
                self.live.record_write_failure(format!(
                    "durable queue full; dropped {} sample at {}",
                    sample.kind(),
                    sample.timestamp()
                ));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                if !self.writer_closed_reported.swap(true, Ordering::Relaxed) {
                    tracing::debug!("History writer closed; further samples are memory-only");
                    self.live
                        .record_write_failure("durable writer closed".to_string());
                }
            }
        }
    }

    /// Live samples no older than `window_secs` before the newest one, insertion order.
    pub fn query(&self, kind: SampleKind, window_secs: u64) -> Vec<Sample> {
        let w = self.live.window(kind);
        w.since(w.newest_ts().saturating_sub(window_secs.saturating_mul(1000)))
    }

    pub fn recent(&self, kind: SampleKind, limit: usize) -> Vec<Sample> {
        self.live.window(kind).recent(limit)
    }

    /// Durable range `[from_ms, to_ms)`, ascending.
    pub async fn history(
        &self,
        kind: SampleKind,
        from_ms: u64,
        to_ms: u64,
    ) -> anyhow::Result<Vec<Sample>> {
        self.repo.get_range(kind, from_ms, to_ms).await
    }

    pub async fn recent_history(&self, kind: SampleKind, limit: u32) -> anyhow::Result<Vec<Sample>> {
        self.repo.get_recent(kind, limit).await
    }

    pub fn set_window_secs(&self, window_secs: u64) {
        for kind in SampleKind::ALL {
            self.live.window(kind).set_window_secs(window_secs);
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.live.window(SampleKind::Network).window_secs()
    }

    pub fn write_failures(&self) -> u64 {
        self.live.write_failures.load(Ordering::Relaxed)
    }

    /// In-window samples evicted because the window hit `max_window_samples`.
    pub fn window_capped_total(&self) -> u64 {
        self.live.capped_total.load(Ordering::Relaxed)
    }

    pub fn saved_total(&self) -> u64 {
        self.saved_total.load(Ordering::Relaxed)
    }

    pub fn repo(&self) -> &Arc<HistoryRepo> {
        &self.repo
    }
}

struct WriterConfig {
    flush_rate: u64,
    flush_interval_secs: u64,
}

/// Receives samples and flushes them in one transaction when the buffer reaches `flush_rate`,
/// every `flush_interval_secs`, and once more on shutdown after draining the queue.
fn spawn_writer(
    mut write_rx: mpsc::Receiver<Sample>,
    repo: Arc<HistoryRepo>,
    live: Arc<LiveWindows>,
    config: WriterConfig,
    saved_total: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let flush_interval = Duration::from_secs(config.flush_interval_secs);
    tokio::spawn(async move {
        let mut buffer: Vec<Sample> = Vec::new();
        let mut flush_tick = interval(flush_interval);
        flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = write_rx.recv() => {
                    match result {
                        Some(sample) => {
                            buffer.push(sample);
                            if buffer.len() >= config.flush_rate as usize {
                                flush_buffer(&repo, &live, &mut buffer, &saved_total).await;
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_tick.tick() => {
                    flush_buffer(&repo, &live, &mut buffer, &saved_total).await;
                }
                // watch::Ref is not Send; drop it before the final flush.
                _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                    write_rx.close();
                    while let Ok(sample) = write_rx.try_recv() {
                        buffer.push(sample);
                    }
                    break;
                }
            }
        }
        flush_buffer(&repo, &live, &mut buffer, &saved_total).await;
        tracing::debug!("History writer shutting down");
    })
}

/// Failed batches are dropped and reported; retrying would grow the buffer without bound.
async fn flush_buffer(
    repo: &HistoryRepo,
    live: &LiveWindows,
    buffer: &mut Vec<Sample>,
    saved_total: &AtomicU64,
) {
    if buffer.is_empty() {
        return;
    }
    let n = buffer.len();
    match repo.save_samples(buffer).await {
        Ok(()) => {
            saved_total.fetch_add(n as u64, Ordering::Relaxed);
            tracing::debug!(operation = "save_samples", samples_count = n, "Samples saved");
        }
        Err(e) => {
            tracing::warn!(error = %e, samples_count = n, "history writer: save_samples failed");
            live.record_write_failure(format!("failed to persist {} samples: {}", n, e));
        }
    }
    buffer.clear();
}
