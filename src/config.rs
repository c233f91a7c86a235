use crate::interfaces::InterfaceScope;
use crate::scheduler::{MonitorSettings, TICK_INTERVALS_SECS, WINDOW_CHOICES_SECS};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_flush_rate")]
    pub flush_rate: u64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// 0 keeps history forever.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Cron expression (local time) for VACUUM; takes precedence over `vacuum_interval_secs`.
    #[serde(default)]
    pub vacuum_schedule: Option<String>,
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_flush_rate() -> u64 {
    20
}

fn default_flush_interval_secs() -> u64 {
    10
}

fn default_retention_days() -> u32 {
    30
}

fn default_vacuum_interval_secs() -> u64 {
    24 * 60 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Live window length; one of the selectable windows.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_window_samples")]
    pub max_window_samples: usize,
    #[serde(default = "default_interface_refresh_secs")]
    pub interface_refresh_secs: u64,
    #[serde(default)]
    pub interface_scope: InterfaceScope,
    /// How often to log app stats (samples published/saved, write failures, ws clients) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
    #[serde(default = "default_cpu_sample_ms")]
    pub cpu_sample_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            window_secs: default_window_secs(),
            max_window_samples: default_max_window_samples(),
            interface_refresh_secs: default_interface_refresh_secs(),
            interface_scope: InterfaceScope::default(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
            cpu_sample_ms: default_cpu_sample_ms(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    1
}

fn default_window_secs() -> u64 {
    300
}

fn default_max_window_samples() -> usize {
    100_000
}

fn default_interface_refresh_secs() -> u64 {
    30
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

fn default_cpu_sample_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatencyConfig {
    /// `host:port` pairs probed in rotation.
    #[serde(default = "default_latency_targets")]
    pub targets: Vec<String>,
    #[serde(default = "default_latency_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_latency_interval_ms")]
    pub interval_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            targets: default_latency_targets(),
            timeout_ms: default_latency_timeout_ms(),
            interval_ms: default_latency_interval_ms(),
        }
    }
}

fn default_latency_targets() -> Vec<String> {
    vec!["8.8.8.8:53".into(), "1.1.1.1:53".into(), "9.9.9.9:53".into()]
}

fn default_latency_timeout_ms() -> u64 {
    900
}

fn default_latency_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_benchmark_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_benchmark_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_benchmark_command")]
    pub command: String,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_secs: default_benchmark_period_secs(),
            timeout_secs: default_benchmark_timeout_secs(),
            command: default_benchmark_command(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_benchmark_period_secs() -> u64 {
    300
}

fn default_benchmark_timeout_secs() -> u64 {
    120
}

fn default_benchmark_command() -> String {
    "speedtest-cli".into()
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_geo_url")]
    pub url: String,
    #[serde(default = "default_geo_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_geo_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_geo_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_geo_url(),
            fallback_url: default_geo_fallback_url(),
            timeout_secs: default_geo_timeout_secs(),
            refresh_secs: default_geo_refresh_secs(),
        }
    }
}

fn default_geo_url() -> String {
    "https://ipinfo.io/json".into()
}

fn default_geo_fallback_url() -> String {
    "https://api.ipify.org".into()
}

fn default_geo_timeout_secs() -> u64 {
    5
}

fn default_geo_refresh_secs() -> u64 {
    30 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of updates kept in the broadcast channel for observers (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

fn default_broadcast_capacity() -> usize {
    256
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Runtime-adjustable part of the monitoring config.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            tick_interval_secs: self.monitoring.tick_interval_secs,
            window_secs: self.monitoring.window_secs,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.flush_rate > 0,
            "database.flush_rate must be > 0, got {}",
            self.database.flush_rate
        );
        anyhow::ensure!(
            self.database.flush_interval_secs > 0,
            "database.flush_interval_secs must be > 0, got {}",
            self.database.flush_interval_secs
        );
        if let Some(schedule) = &self.database.vacuum_schedule {
            anyhow::ensure!(
                cron::Schedule::from_str(schedule).is_ok(),
                "database.vacuum_schedule is not a valid cron expression: {}",
                schedule
            );
        } else {
            anyhow::ensure!(
                self.database.vacuum_interval_secs > 0,
                "database.vacuum_interval_secs must be > 0, got {}",
                self.database.vacuum_interval_secs
            );
        }
        anyhow::ensure!(
            TICK_INTERVALS_SECS.contains(&self.monitoring.tick_interval_secs),
            "monitoring.tick_interval_secs must be one of {:?}, got {}",
            TICK_INTERVALS_SECS,
            self.monitoring.tick_interval_secs
        );
        anyhow::ensure!(
            WINDOW_CHOICES_SECS.contains(&self.monitoring.window_secs),
            "monitoring.window_secs must be one of {:?}, got {}",
            WINDOW_CHOICES_SECS,
            self.monitoring.window_secs
        );
        anyhow::ensure!(
            self.monitoring.max_window_samples > 0,
            "monitoring.max_window_samples must be > 0, got {}",
            self.monitoring.max_window_samples
        );
        anyhow::ensure!(
            self.monitoring.interface_refresh_secs > 0,
            "monitoring.interface_refresh_secs must be > 0, got {}",
            self.monitoring.interface_refresh_secs
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.latency.targets.is_empty(),
            "latency.targets must be non-empty"
        );
        anyhow::ensure!(
            self.latency.timeout_ms > 0 && self.latency.timeout_ms < 1000,
            "latency.timeout_ms must be between 1 and 999, got {}",
            self.latency.timeout_ms
        );
        anyhow::ensure!(
            self.latency.interval_ms > 0,
            "latency.interval_ms must be > 0, got {}",
            self.latency.interval_ms
        );
        if self.benchmark.enabled {
            anyhow::ensure!(
                self.benchmark.period_secs > 0,
                "benchmark.period_secs must be > 0, got {}",
                self.benchmark.period_secs
            );
            anyhow::ensure!(
                self.benchmark.timeout_secs > 0,
                "benchmark.timeout_secs must be > 0, got {}",
                self.benchmark.timeout_secs
            );
            anyhow::ensure!(
                !self.benchmark.command.trim().is_empty(),
                "benchmark.command must be non-empty"
            );
        }
        if self.geo.enabled {
            anyhow::ensure!(
                self.geo.timeout_secs > 0,
                "geo.timeout_secs must be > 0, got {}",
                self.geo.timeout_secs
            );
            anyhow::ensure!(
                self.geo.refresh_secs > 0,
                "geo.refresh_secs must be > 0, got {}",
                self.geo.refresh_secs
            );
        }
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        Ok(())
    }
}
