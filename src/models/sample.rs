// Kind-tagged sample: the unit appended to the series store and published to observers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{BenchmarkResult, Event, NetworkSample, SystemSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Network,
    System,
    Benchmark,
    Event,
}

impl SampleKind {
    pub const ALL: [SampleKind; 4] = [
        SampleKind::Network,
        SampleKind::System,
        SampleKind::Benchmark,
        SampleKind::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Network => "network",
            SampleKind::System => "system",
            SampleKind::Benchmark => "benchmark",
            SampleKind::Event => "event",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "network" => Ok(SampleKind::Network),
            "system" => Ok(SampleKind::System),
            "benchmark" | "benchmarks" => Ok(SampleKind::Benchmark),
            "event" | "events" => Ok(SampleKind::Event),
            other => Err(format!("unknown sample kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Sample {
    Network(NetworkSample),
    System(SystemSample),
    Benchmark(BenchmarkResult),
    Event(Event),
}

impl Sample {
    pub fn kind(&self) -> SampleKind {
        match self {
            Sample::Network(_) => SampleKind::Network,
            Sample::System(_) => SampleKind::System,
            Sample::Benchmark(_) => SampleKind::Benchmark,
            Sample::Event(_) => SampleKind::Event,
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        match self {
            Sample::Network(s) => s.timestamp,
            Sample::System(s) => s.timestamp,
            Sample::Benchmark(s) => s.timestamp,
            Sample::Event(s) => s.timestamp,
        }
    }
}
