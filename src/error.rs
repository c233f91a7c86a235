// Failure taxonomy for the sampling core. None of these stop the scheduler.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// No active interface; the tick carries no network sample.
    #[error("no active network interface")]
    NotFound,
    #[error("{target} unreachable: {reason}")]
    Unreachable { target: String, reason: String },
    #[error("{what} timed out after {after_ms} ms")]
    Timeout { what: String, after_ms: u64 },
    /// A resource metric could not be read; the field degrades to zero.
    #[error("{metric} unavailable: {reason}")]
    PermissionOrPlatform { metric: &'static str, reason: String },
    #[error("storage write failed: {0}")]
    StorageWrite(String),
    /// A benchmark was requested while one is in flight. Rejected, not queued.
    #[error("benchmark already running")]
    AlreadyRunning,
}
