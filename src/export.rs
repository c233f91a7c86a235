// Flat export records for a historical range. Serialization to CSV/JSON files is the caller's job.

use crate::models::{BenchmarkResult, Event, NetworkSample, Sample, SampleKind, SystemSample};
use crate::series::SeriesStore;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkRecord {
    pub timestamp: u64,
    pub time: String,
    pub interface_name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub upload_rate_bps: f64,
    pub download_rate_bps: f64,
    pub latency_ms: Option<f64>,
    pub link_speed: Option<u64>,
    pub public_ip: Option<String>,
    pub isp: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemRecord {
    pub timestamp: u64,
    pub time: String,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used_bytes: u64,
    pub ram_total_bytes: u64,
    pub disk_percent: f64,
    pub disk_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRecord {
    pub timestamp: u64,
    pub time: String,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server_name: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub timestamp: u64,
    pub time: String,
    pub event_type: &'static str,
    pub level: &'static str,
    pub message: String,
}

/// One flat row; serializes as the inner record without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportRecord {
    Network(NetworkRecord),
    System(SystemRecord),
    Benchmark(BenchmarkRecord),
    Event(EventRecord),
}

/// Column order for a CSV header, matching the record's field order.
pub fn columns(kind: SampleKind) -> &'static [&'static str] {
    match kind {
        SampleKind::Network => &[
            "timestamp",
            "time",
            "interface_name",
            "bytes_sent",
            "bytes_recv",
            "packets_sent",
            "packets_recv",
            "upload_rate_bps",
            "download_rate_bps",
            "latency_ms",
            "link_speed",
            "public_ip",
            "isp",
            "location",
        ],
        SampleKind::System => &[
            "timestamp",
            "time",
            "cpu_percent",
            "ram_percent",
            "ram_used_bytes",
            "ram_total_bytes",
            "disk_percent",
            "disk_used_bytes",
            "disk_total_bytes",
            "uptime_seconds",
        ],
        SampleKind::Benchmark => &[
            "timestamp",
            "time",
            "download_mbps",
            "upload_mbps",
            "ping_ms",
            "server_name",
            "succeeded",
            "error_message",
        ],
        SampleKind::Event => &["timestamp", "time", "event_type", "level", "message"],
    }
}

/// RFC 3339 UTC with milliseconds; empty when out of chrono's range.
fn iso_time(timestamp_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms as i64)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}

impl From<NetworkSample> for NetworkRecord {
    fn from(s: NetworkSample) -> Self {
        let (public_ip, isp, location) = match s.geo {
            Some(g) => (Some(g.public_ip), Some(g.isp), Some(g.location)),
            None => (None, None, None),
        };
        Self {
            timestamp: s.timestamp,
            time: iso_time(s.timestamp),
            interface_name: s.interface_name,
            bytes_sent: s.bytes_sent,
            bytes_recv: s.bytes_recv,
            packets_sent: s.packets_sent,
            packets_recv: s.packets_recv,
            upload_rate_bps: s.upload_rate_bps,
            download_rate_bps: s.download_rate_bps,
            latency_ms: s.latency_ms,
            link_speed: s.link_speed,
            public_ip,
            isp,
            location,
        }
    }
}

impl From<SystemSample> for SystemRecord {
    fn from(s: SystemSample) -> Self {
        Self {
            timestamp: s.timestamp,
            time: iso_time(s.timestamp),
            cpu_percent: s.cpu_percent,
            ram_percent: s.ram_percent,
            ram_used_bytes: s.ram_used_bytes,
            ram_total_bytes: s.ram_total_bytes,
            disk_percent: s.disk_percent,
            disk_used_bytes: s.disk_used_bytes,
            disk_total_bytes: s.disk_total_bytes,
            uptime_seconds: s.uptime_seconds,
        }
    }
}

impl From<BenchmarkResult> for BenchmarkRecord {
    fn from(r: BenchmarkResult) -> Self {
        Self {
            timestamp: r.timestamp,
            time: iso_time(r.timestamp),
            download_mbps: r.download_mbps,
            upload_mbps: r.upload_mbps,
            ping_ms: r.ping_ms,
            server_name: r.server_name,
            succeeded: r.succeeded,
            error_message: r.error_message,
        }
    }
}

impl From<Event> for EventRecord {
    fn from(e: Event) -> Self {
        Self {
            timestamp: e.timestamp,
            time: iso_time(e.timestamp),
            event_type: e.kind.as_str(),
            level: e.level.as_str(),
            message: e.message,
        }
    }
}

impl From<Sample> for ExportRecord {
    fn from(sample: Sample) -> Self {
        match sample {
            Sample::Network(s) => ExportRecord::Network(s.into()),
            Sample::System(s) => ExportRecord::System(s.into()),
            Sample::Benchmark(r) => ExportRecord::Benchmark(r.into()),
            Sample::Event(e) => ExportRecord::Event(e.into()),
        }
    }
}

/// Durable records of `kind` in `[from_ms, to_ms)`, oldest first.
pub async fn export_range(
    store: &SeriesStore,
    kind: SampleKind,
    from_ms: u64,
    to_ms: u64,
) -> anyhow::Result<Vec<ExportRecord>> {
    anyhow::ensure!(from_ms <= to_ms, "export range is inverted: from {} > to {}", from_ms, to_ms);
    let samples = store.history(kind, from_ms, to_ms).await?;
    Ok(samples.into_iter().map(ExportRecord::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventKind, EventLevel, GeoInfo};

    #[test]
    fn network_record_flattens_geo() {
        let sample = NetworkSample {
            timestamp: 1_700_000_000_000,
            interface_name: "eth0".into(),
            bytes_sent: 10,
            bytes_recv: 20,
            packets_sent: 1,
            packets_recv: 2,
            upload_rate_bps: 5.0,
            download_rate_bps: 6.0,
            latency_ms: None,
            link_speed: Some(1_000_000_000),
            geo: Some(GeoInfo {
                public_ip: "203.0.113.7".into(),
                isp: "Example ISP".into(),
                location: "Berlin, DE".into(),
            }),
        };
        let value = serde_json::to_value(ExportRecord::from(Sample::Network(sample))).unwrap();
        assert_eq!(value["interface_name"], "eth0");
        assert_eq!(value["public_ip"], "203.0.113.7");
        assert_eq!(value["time"], "2023-11-14T22:13:20.000Z");
        assert!(value["latency_ms"].is_null());
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for column in columns(SampleKind::Network) {
            assert!(keys.contains(column), "missing {column}");
        }
    }

    #[test]
    fn event_record_uses_stored_names() {
        let event = Event::new(0, EventKind::ProbeFailed, EventLevel::Warning, "down");
        let value = serde_json::to_value(ExportRecord::from(Sample::Event(event))).unwrap();
        assert_eq!(value["event_type"], "probe_failed");
        assert_eq!(value["level"], "WARNING");
        assert_eq!(value["time"], "1970-01-01T00:00:00.000Z");
    }
}
