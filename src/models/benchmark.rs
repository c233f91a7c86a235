// Bandwidth benchmark models

use serde::{Deserialize, Serialize};

/// Lifecycle of the single benchmark slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// What asked for a run; only used for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BenchmarkTrigger {
    Scheduled,
    OnDemand,
}

/// Normalized output of an external benchmark tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkMeasurement {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub timestamp: u64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server_name: String,
    pub succeeded: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl BenchmarkResult {
    pub fn completed(timestamp: u64, m: BenchmarkMeasurement) -> Self {
        Self {
            timestamp,
            download_mbps: m.download_mbps,
            upload_mbps: m.upload_mbps,
            ping_ms: m.ping_ms,
            server_name: m.server_name,
            succeeded: true,
            error_message: None,
        }
    }

    /// A failed run always carries a non-empty message.
    pub fn failed(timestamp: u64, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "benchmark failed".to_string()
        } else {
            message
        };
        Self {
            timestamp,
            download_mbps: 0.0,
            upload_mbps: 0.0,
            ping_ms: 0.0,
            server_name: String::new(),
            succeeded: false,
            error_message: Some(message),
        }
    }
}
