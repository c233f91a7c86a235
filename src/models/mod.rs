// Domain models

mod benchmark;
mod event;
mod network;
mod sample;
mod system;

pub use benchmark::{BenchmarkMeasurement, BenchmarkResult, BenchmarkState, BenchmarkTrigger};
pub use event::{Event, EventKind, EventLevel};
pub use network::{Counters, GeoInfo, Interface, NetworkOverview, NetworkSample, NetworkTotals};
pub use sample::{Sample, SampleKind};
pub use system::SystemSample;

/// Wall-clock milliseconds since the Unix epoch; 0 if the clock is before the epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
