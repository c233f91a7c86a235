// Round-trip latency probing against a rotating set of targets.
// Runs on its own task; the tick loop only reads the last value from a watch slot.

use crate::error::MonitorError;
use crate::models::{EventKind, EventLevel, now_ms};
use crate::publisher::Publisher;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, instrument};

/// Targets tried per probe before reporting unreachable.
const MAX_ATTEMPTS: usize = 2;

/// Reachability check returning round-trip milliseconds.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, target: &'a str, timeout: Duration) -> BoxFuture<'a, Result<f64, MonitorError>>;
}

/// TCP handshake round trip to `host:port`; needs no raw-socket privileges.
pub struct TcpConnectProber;

impl Prober for TcpConnectProber {
    fn probe<'a>(&'a self, target: &'a str, timeout: Duration) -> BoxFuture<'a, Result<f64, MonitorError>> {
        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
                Ok(Ok(_stream)) => Ok(started.elapsed().as_secs_f64() * 1000.0),
                Ok(Err(e)) => Err(MonitorError::Unreachable {
                    target: target.to_string(),
                    reason: e.to_string(),
                }),
                Err(_) => Err(MonitorError::Timeout {
                    what: format!("probe {}", target),
                    after_ms: timeout.as_millis() as u64,
                }),
            }
        })
    }
}

/// Last completed probe. `latency_ms` is None when unreachable or never measured.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyReading {
    pub latency_ms: Option<f64>,
    pub measured_at: u64,
}

pub struct LatencyProbe {
    prober: Arc<dyn Prober>,
    targets: Vec<String>,
    next: AtomicUsize,
    timeout: Duration,
}

impl LatencyProbe {
    pub fn new(prober: Arc<dyn Prober>, targets: Vec<String>, timeout: Duration) -> Self {
        Self {
            prober,
            targets,
            next: AtomicUsize::new(0),
            timeout,
        }
    }

    pub async fn probe(&self, target: &str) -> Result<f64, MonitorError> {
        self.prober.probe(target, self.timeout).await
    }

    /// Probe the next target in rotation; on failure try one more before giving up.
    /// Worst case takes `MAX_ATTEMPTS * timeout`.
    #[instrument(skip(self), fields(operation = "probe_latency"))]
    pub async fn probe_next(&self) -> Result<f64, MonitorError> {
        if self.targets.is_empty() {
            return Err(MonitorError::Unreachable {
                target: "<none>".into(),
                reason: "no probe targets configured".into(),
            });
        }
        let mut last_err = None;
        for _ in 0..self.targets.len().min(MAX_ATTEMPTS) {
            let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.targets.len();
            let target = &self.targets[idx];
            match self.probe(target).await {
                Ok(ms) => return Ok(ms),
                Err(e) => {
                    debug!(target = %target, error = %e, "probe attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| MonitorError::Unreachable {
            target: "<none>".into(),
            reason: "no probe attempted".into(),
        }))
    }
}

/// Probe on a fixed period, writing each outcome into `slot` (last write wins).
/// Reachable/unreachable transitions are recorded as events; steady state is not.
pub fn spawn_probe_worker(
    probe: Arc<LatencyProbe>,
    slot: watch::Sender<LatencyReading>,
    publisher: Arc<Publisher>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut reachable: Option<bool> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let outcome = probe.probe_next().await;
                    let measured_at = now_ms();
                    match outcome {
                        Ok(ms) => {
                            slot.send_replace(LatencyReading { latency_ms: Some(ms), measured_at });
                            if reachable == Some(false) {
                                publisher.event(
                                    EventKind::ProbeRecovered,
                                    EventLevel::Info,
                                    format!("latency probe recovered ({:.1} ms)", ms),
                                );
                            }
                            reachable = Some(true);
                        }
                        Err(e) => {
                            slot.send_replace(LatencyReading { latency_ms: None, measured_at });
                            if reachable != Some(false) {
                                publisher.event(
                                    EventKind::ProbeFailed,
                                    EventLevel::Warning,
                                    format!("latency probe failed: {}", e),
                                );
                            }
                            reachable = Some(false);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Probe worker shutting down");
                    break;
                }
            }
        }
    })
}
