// Bandwidth benchmark orchestration: single-flight, asynchronous, timeout-bounded.
//
// State machine: Idle -> Running -> {Completed | Failed} -> (callbacks) -> Idle.
// A start request in any state other than Idle is rejected with AlreadyRunning.

mod speedtest;

pub use speedtest::{SpeedtestCli, parse_speedtest_json};

use crate::error::MonitorError;
use crate::models::{BenchmarkMeasurement, BenchmarkResult, BenchmarkState, BenchmarkTrigger, now_ms};
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// External measurement tool. The coordinator adds the timeout and the single-flight guard.
pub trait BenchmarkRunner: Send + Sync {
    fn run(&self) -> BoxFuture<'_, anyhow::Result<BenchmarkMeasurement>>;
}

type CompletionCallback = Arc<dyn Fn(&BenchmarkResult) + Send + Sync>;

/// Puts the slot back to Idle when a run ends, including by panic or abort.
struct ReleaseOnDrop<'a>(&'a watch::Sender<BenchmarkState>);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("benchmark task panicked; slot released");
        }
        self.0.send_replace(BenchmarkState::Idle);
    }
}

pub struct BenchmarkCoordinator {
    runner: Arc<dyn BenchmarkRunner>,
    timeout: Duration,
    state: watch::Sender<BenchmarkState>,
    last_result: Mutex<Option<BenchmarkResult>>,
    callbacks: Mutex<Vec<CompletionCallback>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl BenchmarkCoordinator {
    pub fn new(runner: Arc<dyn BenchmarkRunner>, timeout: Duration) -> Arc<Self> {
        let (state, _) = watch::channel(BenchmarkState::Idle);
        Arc::new(Self {
            runner,
            timeout,
            state,
            last_result: Mutex::new(None),
            callbacks: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
        })
    }

    /// Register a callback invoked with every terminal result, success or failure.
    pub fn on_complete(&self, callback: impl Fn(&BenchmarkResult) + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn state(&self) -> BenchmarkState {
        *self.state.borrow()
    }

    /// Watch state transitions (e.g. wait for Idle).
    pub fn subscribe_state(&self) -> watch::Receiver<BenchmarkState> {
        self.state.subscribe()
    }

    pub fn last_result(&self) -> Option<BenchmarkResult> {
        self.last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Begin a run in the background. Rejected, not queued, while one is in flight.
    pub fn start(self: &Arc<Self>, trigger: BenchmarkTrigger) -> Result<(), MonitorError> {
        let accepted = self.state.send_if_modified(|state| {
            if *state == BenchmarkState::Idle {
                *state = BenchmarkState::Running;
                true
            } else {
                false
            }
        });
        if !accepted {
            info!(?trigger, state = ?self.state(), "benchmark already running; request rejected");
            return Err(MonitorError::AlreadyRunning);
        }

        info!(?trigger, "benchmark started");
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.execute().await });
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    async fn execute(&self) {
        let _release = ReleaseOnDrop(&self.state);
        let outcome = tokio::time::timeout(self.timeout, self.runner.run()).await;
        let finished_at = now_ms();
        let result = match outcome {
            Ok(Ok(measurement)) => BenchmarkResult::completed(finished_at, measurement),
            Ok(Err(e)) => BenchmarkResult::failed(finished_at, format!("{:#}", e)),
            Err(_) => BenchmarkResult::failed(
                finished_at,
                MonitorError::Timeout {
                    what: "benchmark".into(),
                    after_ms: self.timeout.as_millis() as u64,
                }
                .to_string(),
            ),
        };

        self.state.send_replace(if result.succeeded {
            BenchmarkState::Completed
        } else {
            BenchmarkState::Failed
        });
        *self.last_result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());

        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            callback(&result);
        }
        debug!(succeeded = result.succeeded, "benchmark published");
    }

    /// Start on a wall-clock period; the first run is one period after spawning.
    /// Ticks that find a run still in flight are skipped.
    pub fn spawn_schedule(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = this.start(BenchmarkTrigger::Scheduled) {
                            debug!(error = %e, "scheduled benchmark skipped");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Benchmark schedule shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Let an in-flight run finish within `grace`; otherwise abandon it and discard its result.
    pub async fn shutdown(&self, grace: Duration) {
        let handle = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = handle else {
            return;
        };
        if handle.is_finished() {
            return;
        }
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "benchmark still running at shutdown; abandoned");
            handle.abort();
            self.state.send_replace(BenchmarkState::Idle);
        }
    }
}
