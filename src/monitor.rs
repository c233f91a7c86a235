// Wires samplers, workers and the series store together and owns their shutdown order:
// stop producers, give the benchmark its grace period, then flush the durable writer last.

use crate::benchmark::{BenchmarkCoordinator, BenchmarkRunner, SpeedtestCli};
use crate::config::AppConfig;
use crate::geo::{GeoLookup, spawn_geo_worker};
use crate::history_repo::HistoryRepo;
use crate::interfaces::{InterfaceRegistry, InterfaceSource, SysinfoInterfaces};
use crate::latency::{LatencyProbe, LatencyReading, Prober, TcpConnectProber, spawn_probe_worker};
use crate::maintenance::{self, MaintenanceConfig};
use crate::models::{BenchmarkResult, EventKind, EventLevel, NetworkOverview, Sample};
use crate::publisher::Publisher;
use crate::resources::ResourceSampler;
use crate::scheduler::{MonitorSettings, Scheduler, SchedulerConfig, SchedulerDeps};
use crate::series::{SeriesConfig, SeriesStore};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const PRUNE_INTERVAL_SECS: u64 = 3600;

/// OS and network adapters; swapped for stubs in tests.
pub struct MonitorParts {
    pub interfaces: Box<dyn InterfaceSource>,
    pub prober: Arc<dyn Prober>,
    pub benchmark_runner: Option<Arc<dyn BenchmarkRunner>>,
    pub geo: Option<Arc<GeoLookup>>,
}

pub struct Monitor {
    publisher: Arc<Publisher>,
    benchmark: Option<Arc<BenchmarkCoordinator>>,
    settings: Arc<watch::Sender<MonitorSettings>>,
    ws_connections: Arc<AtomicUsize>,
    overview: watch::Receiver<NetworkOverview>,
    shutdown_tx: watch::Sender<bool>,
    writer_shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    writer: JoinHandle<()>,
    repo: Arc<HistoryRepo>,
    grace: Duration,
}

impl Monitor {
    /// Open the database and start with the real OS and network adapters.
    pub async fn start(config: &AppConfig) -> anyhow::Result<Self> {
        let repo = HistoryRepo::connect(&config.database.path, config.database.retention_days).await?;
        repo.init().await?;

        let benchmark_runner = config.benchmark.enabled.then(|| {
            Arc::new(SpeedtestCli::new(config.benchmark.command.clone())) as Arc<dyn BenchmarkRunner>
        });
        let geo = if config.geo.enabled {
            Some(Arc::new(GeoLookup::new(
                config.geo.url.clone(),
                config.geo.fallback_url.clone(),
                Duration::from_secs(config.geo.timeout_secs),
            )?))
        } else {
            None
        };
        let parts = MonitorParts {
            interfaces: Box::new(SysinfoInterfaces::new()),
            prober: Arc::new(TcpConnectProber),
            benchmark_runner,
            geo,
        };
        Ok(Self::start_with(config, Arc::new(repo), parts))
    }

    /// Start every worker against an initialized repo. Must be called inside a Tokio runtime.
    pub fn start_with(config: &AppConfig, repo: Arc<HistoryRepo>, parts: MonitorParts) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (writer_shutdown_tx, writer_shutdown_rx) = watch::channel(false);
        let mut workers = Vec::new();

        let (store, writer) = SeriesStore::open(
            repo.clone(),
            SeriesConfig {
                window_secs: config.monitoring.window_secs,
                max_window_samples: config.monitoring.max_window_samples,
                flush_rate: config.database.flush_rate,
                flush_interval_secs: config.database.flush_interval_secs,
            },
            writer_shutdown_rx,
        );
        let publisher = Arc::new(Publisher::new(store, config.publishing.broadcast_capacity));
        publisher.event(
            EventKind::Startup,
            EventLevel::Info,
            format!("{} {} started", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        );

        let (latency_tx, latency_rx) = watch::channel(LatencyReading::default());
        let probe = Arc::new(LatencyProbe::new(
            parts.prober,
            config.latency.targets.clone(),
            Duration::from_millis(config.latency.timeout_ms),
        ));
        workers.push(spawn_probe_worker(
            probe,
            latency_tx,
            publisher.clone(),
            Duration::from_millis(config.latency.interval_ms),
            shutdown_rx.clone(),
        ));

        let (geo_tx, geo_rx) = watch::channel(None);
        if let Some(lookup) = parts.geo {
            workers.push(spawn_geo_worker(
                lookup,
                geo_tx,
                Duration::from_secs(config.geo.refresh_secs),
                shutdown_rx.clone(),
            ));
        }

        let benchmark = parts.benchmark_runner.map(|runner| {
            let coordinator =
                BenchmarkCoordinator::new(runner, Duration::from_secs(config.benchmark.timeout_secs));
            let p = publisher.clone();
            coordinator.on_complete(move |result| publish_benchmark(&p, result));
            workers.push(coordinator.spawn_schedule(
                Duration::from_secs(config.benchmark.period_secs),
                shutdown_rx.clone(),
            ));
            coordinator
        });

        let ws_connections = Arc::new(AtomicUsize::new(0));
        let (settings, settings_rx) = watch::channel(config.monitor_settings());
        let scheduler = Scheduler::new(
            SchedulerDeps {
                registry: InterfaceRegistry::new(
                    parts.interfaces,
                    Duration::from_secs(config.monitoring.interface_refresh_secs),
                ),
                resources: ResourceSampler::new(Duration::from_millis(config.monitoring.cpu_sample_ms)),
                publisher: publisher.clone(),
                latency: latency_rx,
                geo: geo_rx,
                ws_connections: ws_connections.clone(),
            },
            SchedulerConfig {
                scope: config.monitoring.interface_scope,
                stats_log_interval_secs: config.monitoring.stats_log_interval_secs,
            },
        );
        let overview = scheduler.overview();
        workers.push(scheduler.spawn(settings_rx, shutdown_rx.clone()));

        workers.push(maintenance::spawn(
            repo.clone(),
            MaintenanceConfig {
                prune_interval_secs: PRUNE_INTERVAL_SECS,
                vacuum_schedule: config.database.vacuum_schedule.clone(),
                vacuum_interval_secs: config.database.vacuum_interval_secs,
            },
            shutdown_rx,
        ));

        info!(workers = workers.len(), "Monitor started");
        Self {
            publisher,
            benchmark,
            settings: Arc::new(settings),
            ws_connections,
            overview,
            shutdown_tx,
            writer_shutdown_tx,
            workers,
            writer,
            repo,
            grace: Duration::from_millis(config.benchmark.shutdown_grace_ms),
        }
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    pub fn benchmark(&self) -> Option<&Arc<BenchmarkCoordinator>> {
        self.benchmark.as_ref()
    }

    pub fn settings(&self) -> &Arc<watch::Sender<MonitorSettings>> {
        &self.settings
    }

    pub fn ws_connections(&self) -> &Arc<AtomicUsize> {
        &self.ws_connections
    }

    pub fn overview(&self) -> &watch::Receiver<NetworkOverview> {
        &self.overview
    }

    /// Stop workers, wait at most the grace period for each, then flush and close storage.
    pub async fn shutdown(self) {
        self.publisher
            .event(EventKind::Shutdown, EventLevel::Info, "shutting down");
        self.shutdown_tx.send_replace(true);

        if let Some(benchmark) = &self.benchmark {
            benchmark.shutdown(self.grace).await;
        }
        for handle in self.workers {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.grace, handle).await.is_err() {
                warn!(grace_ms = self.grace.as_millis() as u64, "worker did not stop in time; aborted");
                abort.abort();
            }
        }

        self.writer_shutdown_tx.send_replace(true);
        if let Err(e) = self.writer.await {
            warn!(error = %e, "history writer task failed");
        }
        self.repo.close().await;
        info!("Monitor stopped");
    }
}

fn publish_benchmark(publisher: &Publisher, result: &BenchmarkResult) {
    publisher.publish(Sample::Benchmark(result.clone()));
    if result.succeeded {
        publisher.event(
            EventKind::BenchmarkCompleted,
            EventLevel::Info,
            format!(
                "download {:.2} Mbps, upload {:.2} Mbps, ping {:.1} ms via {}",
                result.download_mbps, result.upload_mbps, result.ping_ms, result.server_name
            ),
        );
    } else {
        publisher.event(
            EventKind::BenchmarkFailed,
            EventLevel::Warning,
            format!(
                "benchmark failed: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            ),
        );
    }
}
