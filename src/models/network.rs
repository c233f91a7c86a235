// Network interface and throughput sample models

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use wincode::{SchemaRead, SchemaWrite};

/// One host interface as seen by the latest registry refresh. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,
    pub address: Option<IpAddr>,
    pub is_up: bool,
    pub is_loopback: bool,
    /// Link speed in bits per second, when the platform reports one.
    pub link_speed: Option<u64>,
}

/// Raw monotonic counters for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// Public address and provider details, best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub public_ip: String,
    pub isp: String,
    pub location: String,
}

impl GeoInfo {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        Self {
            public_ip: Self::UNKNOWN.into(),
            isp: Self::UNKNOWN.into(),
            location: Self::UNKNOWN.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    pub timestamp: u64,
    pub interface_name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub upload_rate_bps: f64,
    pub download_rate_bps: f64,
    /// `None` when the latest probe was unreachable or none has completed yet.
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub link_speed: Option<u64>,
    #[serde(default)]
    pub geo: Option<GeoInfo>,
}

/// Sums over one tick's network samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTotals {
    pub upload_rate_bps: f64,
    pub download_rate_bps: f64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub interfaces: usize,
}

impl NetworkTotals {
    pub fn from_samples(samples: &[NetworkSample]) -> Self {
        samples.iter().fold(Self::default(), |acc, s| Self {
            upload_rate_bps: acc.upload_rate_bps + s.upload_rate_bps,
            download_rate_bps: acc.download_rate_bps + s.download_rate_bps,
            bytes_sent: acc.bytes_sent.saturating_add(s.bytes_sent),
            bytes_recv: acc.bytes_recv.saturating_add(s.bytes_recv),
            interfaces: acc.interfaces + 1,
        })
    }
}

/// Active interfaces with their addresses and the latest tick's totals. Replaced every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOverview {
    pub timestamp: u64,
    pub primary: Option<String>,
    pub interfaces: Vec<Interface>,
    pub totals: NetworkTotals,
}
