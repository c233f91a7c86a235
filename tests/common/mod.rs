// Shared test helpers: stub adapters, sample builders, temp databases

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use netscope::benchmark::BenchmarkRunner;
use netscope::error::MonitorError;
use netscope::history_repo::HistoryRepo;
use netscope::interfaces::InterfaceSource;
use netscope::latency::Prober;
use netscope::models::*;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Interfaces and counters the test can change between ticks.
#[derive(Default)]
pub struct StubNet {
    pub interfaces: Vec<Interface>,
    pub counters: HashMap<String, Counters>,
}

#[derive(Clone, Default)]
pub struct StubInterfaces(pub Arc<Mutex<StubNet>>);

impl StubInterfaces {
    pub fn with(interfaces: Vec<Interface>) -> Self {
        let counters = interfaces
            .iter()
            .map(|i| (i.name.clone(), Counters::default()))
            .collect();
        Self(Arc::new(Mutex::new(StubNet {
            interfaces,
            counters,
        })))
    }

    pub fn set_counters(&self, name: &str, bytes_sent: u64, bytes_recv: u64) {
        self.0.lock().unwrap().counters.insert(
            name.to_string(),
            Counters {
                bytes_sent,
                bytes_recv,
                packets_sent: bytes_sent / 100,
                packets_recv: bytes_recv / 100,
            },
        );
    }

    pub fn remove(&self, name: &str) {
        let mut net = self.0.lock().unwrap();
        net.interfaces.retain(|i| i.name != name);
        net.counters.remove(name);
    }
}

impl InterfaceSource for StubInterfaces {
    fn enumerate(&mut self) -> Vec<Interface> {
        self.0.lock().unwrap().interfaces.clone()
    }

    fn counters(&mut self) -> HashMap<String, Counters> {
        self.0.lock().unwrap().counters.clone()
    }
}

pub fn ethernet(name: &str, last_octet: u8) -> Interface {
    Interface {
        name: name.into(),
        address: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, last_octet))),
        is_up: true,
        is_loopback: false,
        link_speed: Some(1_000_000_000),
    }
}

pub fn loopback() -> Interface {
    Interface {
        name: "lo".into(),
        address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        is_up: true,
        is_loopback: true,
        link_speed: None,
    }
}

/// Always answers with the same latency, or always fails.
pub struct FixedProber(pub Option<f64>);

impl Prober for FixedProber {
    fn probe<'a>(
        &'a self,
        target: &'a str,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<f64, MonitorError>> {
        Box::pin(async move {
            self.0.ok_or_else(|| MonitorError::Unreachable {
                target: target.into(),
                reason: "stub".into(),
            })
        })
    }
}

/// Sleeps for `delay`, then returns `outcome`. Counts runs.
pub struct ScriptedRunner {
    pub delay: Duration,
    pub outcome: Result<BenchmarkMeasurement, String>,
    pub runs: AtomicUsize,
}

impl ScriptedRunner {
    pub fn ok(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            outcome: Ok(BenchmarkMeasurement {
                download_mbps: 94.12,
                upload_mbps: 18.5,
                ping_ms: 12.3,
                server_name: "Example ISP (Amsterdam)".into(),
            }),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn failing(delay: Duration, message: &str) -> Arc<Self> {
        Arc::new(Self {
            delay,
            outcome: Err(message.into()),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl BenchmarkRunner for ScriptedRunner {
    fn run(&self) -> BoxFuture<'_, anyhow::Result<BenchmarkMeasurement>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone().map_err(anyhow::Error::msg)
        })
    }
}

pub async fn temp_repo() -> (TempDir, Arc<HistoryRepo>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.db");
    let repo = HistoryRepo::connect(path.to_str().unwrap(), 0).await.unwrap();
    repo.init().await.unwrap();
    (dir, Arc::new(repo))
}

pub fn network_sample(timestamp: u64, interface_name: &str) -> NetworkSample {
    NetworkSample {
        timestamp,
        interface_name: interface_name.into(),
        bytes_sent: 1_000,
        bytes_recv: 2_000,
        packets_sent: 10,
        packets_recv: 20,
        upload_rate_bps: 100.0,
        download_rate_bps: 200.0,
        latency_ms: Some(15.5),
        link_speed: None,
        geo: None,
    }
}

pub fn system_sample(timestamp: u64) -> SystemSample {
    SystemSample {
        timestamp,
        cpu_percent: 12.5,
        ram_percent: 50.0,
        ram_used_bytes: 512,
        ram_total_bytes: 1024,
        disk_percent: 25.0,
        disk_used_bytes: 250,
        disk_total_bytes: 1000,
        uptime_seconds: 3600,
    }
}

pub fn event(timestamp: u64, kind: EventKind, message: &str) -> Event {
    Event::new(timestamp, kind, EventLevel::Info, message)
}

/// Minimal valid config pointing at `db_path`; network adapters are stubbed by the caller.
pub fn test_config(db_path: &str) -> String {
    format!(
        r#"
[server]
port = 8081
host = "127.0.0.1"

[database]
path = "{db_path}"
flush_rate = 1
flush_interval_secs = 1

[monitoring]
tick_interval_secs = 1
window_secs = 300
interface_refresh_secs = 60
cpu_sample_ms = 10

[latency]
targets = ["stub:53"]
timeout_ms = 100
interval_ms = 50

[benchmark]
period_secs = 3600
timeout_secs = 5
shutdown_grace_ms = 500

[geo]
enabled = false
"#
    )
}

/// Poll `check` every 20 ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
