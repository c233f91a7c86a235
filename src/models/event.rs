// Audit-trail event model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Startup,
    Shutdown,
    InterfaceFound,
    InterfaceLost,
    PrimaryInterfaceChanged,
    ProbeFailed,
    ProbeRecovered,
    MetricUnavailable,
    MetricRestored,
    BenchmarkCompleted,
    BenchmarkFailed,
    StorageWriteFailed,
    SettingsChanged,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Startup => "startup",
            EventKind::Shutdown => "shutdown",
            EventKind::InterfaceFound => "interface_found",
            EventKind::InterfaceLost => "interface_lost",
            EventKind::PrimaryInterfaceChanged => "primary_interface_changed",
            EventKind::ProbeFailed => "probe_failed",
            EventKind::ProbeRecovered => "probe_recovered",
            EventKind::MetricUnavailable => "metric_unavailable",
            EventKind::MetricRestored => "metric_restored",
            EventKind::BenchmarkCompleted => "benchmark_completed",
            EventKind::BenchmarkFailed => "benchmark_failed",
            EventKind::StorageWriteFailed => "storage_write_failed",
            EventKind::SettingsChanged => "settings_changed",
            EventKind::Unknown => "unknown",
        }
    }

    /// Parse a stored `event_type` column; unrecognized values map to `Unknown`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "startup" => EventKind::Startup,
            "shutdown" => EventKind::Shutdown,
            "interface_found" => EventKind::InterfaceFound,
            "interface_lost" => EventKind::InterfaceLost,
            "primary_interface_changed" => EventKind::PrimaryInterfaceChanged,
            "probe_failed" => EventKind::ProbeFailed,
            "probe_recovered" => EventKind::ProbeRecovered,
            "metric_unavailable" => EventKind::MetricUnavailable,
            "metric_restored" => EventKind::MetricRestored,
            "benchmark_completed" => EventKind::BenchmarkCompleted,
            "benchmark_failed" => EventKind::BenchmarkFailed,
            "storage_write_failed" => EventKind::StorageWriteFailed,
            "settings_changed" => EventKind::SettingsChanged,
            _ => EventKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "INFO",
            EventLevel::Warning => "WARNING",
            EventLevel::Error => "ERROR",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "WARNING" | "WARN" => EventLevel::Warning,
            "ERROR" => EventLevel::Error,
            _ => EventLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub level: EventLevel,
    pub message: String,
}

impl Event {
    pub fn new(timestamp: u64, kind: EventKind, level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            level,
            message: message.into(),
        }
    }
}
