// Sampling control loop. One tick at a time: refresh interfaces when stale, compute rates,
// read host resources, attach the last latency and geo values, publish.
// Events are published only on transitions; routine ticks log at debug.

use crate::interfaces::{InterfaceRegistry, InterfaceScope};
use crate::latency::LatencyReading;
use crate::models::{
    EventKind, EventLevel, GeoInfo, NetworkOverview, NetworkSample, NetworkTotals, Sample, SystemSample,
    now_ms,
};
use crate::publisher::Publisher;
use crate::rate::RateSampler;
use crate::resources::{MetricIssue, ResourceSampler};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio::time::{Duration, Instant, interval, interval_at};
use tracing::{debug, info, instrument, warn};

/// Selectable tick intervals.
pub const TICK_INTERVALS_SECS: [u64; 3] = [1, 3, 5];
/// Selectable live windows: 30s, 5m, 10m, 30m, 1h, 24h.
pub const WINDOW_CHOICES_SECS: [u64; 6] = [30, 300, 600, 1800, 3600, 86_400];

/// Runtime-adjustable settings; a change applies before the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSettings {
    pub tick_interval_secs: u64,
    pub window_secs: u64,
}

impl MonitorSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            TICK_INTERVALS_SECS.contains(&self.tick_interval_secs),
            "tickIntervalSecs must be one of {:?}, got {}",
            TICK_INTERVALS_SECS,
            self.tick_interval_secs
        );
        anyhow::ensure!(
            WINDOW_CHOICES_SECS.contains(&self.window_secs),
            "windowSecs must be one of {:?}, got {}",
            WINDOW_CHOICES_SECS,
            self.window_secs
        );
        Ok(())
    }
}

/// Samplers, slots and sinks the loop reads from and publishes to.
pub struct SchedulerDeps {
    pub registry: InterfaceRegistry,
    pub resources: ResourceSampler,
    pub publisher: Arc<Publisher>,
    pub latency: watch::Receiver<LatencyReading>,
    pub geo: watch::Receiver<Option<GeoInfo>>,
    pub ws_connections: Arc<AtomicUsize>,
}

pub struct SchedulerConfig {
    pub scope: InterfaceScope,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// What one tick produced (already published).
#[derive(Debug, Clone)]
pub struct TickReport {
    pub network: Vec<NetworkSample>,
    pub totals: NetworkTotals,
    pub system: SystemSample,
}

pub struct Scheduler {
    registry: InterfaceRegistry,
    rates: RateSampler,
    resources: ResourceSampler,
    publisher: Arc<Publisher>,
    latency: watch::Receiver<LatencyReading>,
    geo: watch::Receiver<Option<GeoInfo>>,
    ws_connections: Arc<AtomicUsize>,
    overview: watch::Sender<NetworkOverview>,
    scope: InterfaceScope,
    stats_log_interval: Duration,
    known_interfaces: BTreeSet<String>,
    primary: Option<String>,
    refreshed_once: bool,
    open_issues: BTreeMap<&'static str, String>,
    ticks_total: u64,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig) -> Self {
        let SchedulerDeps {
            registry,
            resources,
            publisher,
            latency,
            geo,
            ws_connections,
        } = deps;
        Self {
            registry,
            rates: RateSampler::new(),
            resources,
            publisher,
            latency,
            geo,
            ws_connections,
            overview: watch::Sender::new(NetworkOverview::default()),
            scope: config.scope,
            stats_log_interval: Duration::from_secs(config.stats_log_interval_secs.max(1)),
            known_interfaces: BTreeSet::new(),
            primary: None,
            refreshed_once: false,
            open_issues: BTreeMap::new(),
            ticks_total: 0,
        }
    }

    /// Active interfaces and per-tick totals, updated after every tick.
    pub fn overview(&self) -> watch::Receiver<NetworkOverview> {
        self.overview.subscribe()
    }

    /// Run one sampling pass and publish its samples. Never fails.
    #[instrument(skip(self), fields(operation = "tick"))]
    pub async fn tick(&mut self) -> TickReport {
        let now = now_ms();
        if self.registry.is_stale() {
            self.refresh_interfaces();
        }

        let monitored = self.registry.monitored(self.scope);
        if monitored.is_empty() {
            debug!("no active interface; tick carries no network sample");
        }
        let counters = if monitored.is_empty() {
            Default::default()
        } else {
            self.registry.counters()
        };
        let latency_ms = self.latency.borrow().latency_ms;
        let geo = self.geo.borrow().clone();

        let mut network = Vec::with_capacity(monitored.len());
        let mut vanished = Vec::new();
        for iface in monitored {
            let Some(c) = counters.get(&iface.name) else {
                vanished.push(iface.name);
                continue;
            };
            let rate = self.rates.sample(&iface.name, c.bytes_sent, c.bytes_recv, now);
            network.push(NetworkSample {
                timestamp: now,
                interface_name: iface.name,
                bytes_sent: c.bytes_sent,
                bytes_recv: c.bytes_recv,
                packets_sent: c.packets_sent,
                packets_recv: c.packets_recv,
                upload_rate_bps: rate.upload_bps,
                download_rate_bps: rate.download_bps,
                latency_ms,
                link_speed: iface.link_speed,
                geo: geo.clone(),
            });
        }
        if !vanished.is_empty() {
            debug!(?vanished, "interfaces missing from counters; refreshing next tick");
            for name in &vanished {
                self.rates.forget(name);
            }
            self.registry.mark_stale();
        }

        let reading = self.resources.sample().await;
        self.track_issues(&reading.issues);
        let system = SystemSample {
            timestamp: now,
            ..reading.sample
        };

        let totals = NetworkTotals::from_samples(&network);
        self.overview.send_replace(NetworkOverview {
            timestamp: now,
            primary: self.primary.clone(),
            interfaces: self.registry.active().to_vec(),
            totals,
        });

        for sample in &network {
            self.publisher.publish(Sample::Network(sample.clone()));
        }
        self.publisher.publish(Sample::System(system.clone()));
        self.ticks_total += 1;

        TickReport {
            network,
            totals,
            system,
        }
    }

    /// Re-enumerate and emit found/lost/primary-changed events for whatever moved.
    fn refresh_interfaces(&mut self) {
        let active: BTreeSet<String> = self
            .registry
            .refresh()
            .iter()
            .map(|i| i.name.clone())
            .collect();
        let primary = self.registry.primary().ok().map(|i| i.name.clone());

        for name in active.difference(&self.known_interfaces) {
            self.publisher.event(
                EventKind::InterfaceFound,
                EventLevel::Info,
                format!("interface {} is active", name),
            );
        }
        for name in self.known_interfaces.difference(&active) {
            self.rates.forget(name);
            self.publisher.event(
                EventKind::InterfaceLost,
                EventLevel::Warning,
                format!("interface {} is no longer active", name),
            );
        }

        if primary != self.primary || !self.refreshed_once {
            match &primary {
                Some(name) => self.publisher.event(
                    EventKind::PrimaryInterfaceChanged,
                    EventLevel::Info,
                    format!("primary interface: {}", name),
                ),
                None => self.publisher.event(
                    EventKind::PrimaryInterfaceChanged,
                    EventLevel::Warning,
                    "no active network interface",
                ),
            }
        }

        self.known_interfaces = active;
        self.primary = primary;
        self.refreshed_once = true;
    }

    fn track_issues(&mut self, issues: &[MetricIssue]) {
        let current: BTreeMap<&'static str, String> = issues
            .iter()
            .map(|i| (i.metric, i.reason.clone()))
            .collect();
        for (metric, reason) in &current {
            if !self.open_issues.contains_key(metric) {
                self.publisher.event(
                    EventKind::MetricUnavailable,
                    EventLevel::Warning,
                    format!("{} unavailable: {}", metric, reason),
                );
            }
        }
        for metric in self.open_issues.keys() {
            if !current.contains_key(metric) {
                self.publisher.event(
                    EventKind::MetricRestored,
                    EventLevel::Info,
                    format!("{} readable again", metric),
                );
            }
        }
        self.open_issues = current;
    }

    pub fn spawn(
        self,
        settings_rx: watch::Receiver<MonitorSettings>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(settings_rx, shutdown_rx))
    }

    async fn run(
        mut self,
        mut settings_rx: watch::Receiver<MonitorSettings>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut current = *settings_rx.borrow_and_update();
        let mut tick = interval(Duration::from_secs(current.tick_interval_secs.max(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(self.stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut settings_open = true;

        info!(
            tick_interval_secs = current.tick_interval_secs,
            window_secs = current.window_secs,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.tick().await;
                    debug!(network_samples = report.network.len(), "tick complete");
                }
                changed = settings_rx.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                    let next = *settings_rx.borrow_and_update();
                    if next == current {
                        continue;
                    }
                    if let Err(e) = next.validate() {
                        warn!(error = %e, "ignoring invalid monitor settings");
                        continue;
                    }
                    if next.tick_interval_secs != current.tick_interval_secs {
                        let period = Duration::from_secs(next.tick_interval_secs);
                        tick = interval_at(Instant::now() + period, period);
                        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    }
                    if next.window_secs != current.window_secs {
                        self.publisher.store().set_window_secs(next.window_secs);
                    }
                    self.publisher.event(
                        EventKind::SettingsChanged,
                        EventLevel::Info,
                        format!(
                            "tick interval {}s, window {}s",
                            next.tick_interval_secs, next.window_secs
                        ),
                    );
                    current = next;
                }
                _ = stats_log_tick.tick() => {
                    let store = self.publisher.store();
                    info!(
                        ticks_total = self.ticks_total,
                        samples_published_total = self.publisher.published_total(),
                        samples_saved_total = store.saved_total(),
                        storage_write_failures = store.write_failures(),
                        window_capped_total = store.window_capped_total(),
                        ws_clients = self.ws_connections.load(Ordering::Relaxed),
                        "app stats"
                    );
                }
                _ = shutdown_rx.changed() => {
                    debug!("Scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_accept_only_selectable_values() {
        let ok = MonitorSettings {
            tick_interval_secs: 3,
            window_secs: 600,
        };
        assert!(ok.validate().is_ok());
        let bad_tick = MonitorSettings {
            tick_interval_secs: 2,
            ..ok
        };
        assert!(bad_tick.validate().unwrap_err().to_string().contains("tickIntervalSecs"));
        let bad_window = MonitorSettings {
            window_secs: 45,
            ..ok
        };
        assert!(bad_window.validate().unwrap_err().to_string().contains("windowSecs"));
    }

    #[test]
    fn settings_json_is_camel_case() {
        let s: MonitorSettings =
            serde_json::from_str(r#"{"tickIntervalSecs":5,"windowSecs":30}"#).unwrap();
        assert_eq!(
            s,
            MonitorSettings {
                tick_interval_secs: 5,
                window_secs: 30
            }
        );
    }
}
