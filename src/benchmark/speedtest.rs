// speedtest-cli adapter: run `speedtest-cli --json` and normalize its report.

use super::BenchmarkRunner;
use crate::models::BenchmarkMeasurement;
use anyhow::Context;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct SpeedtestReport {
    /// bits per second
    download: f64,
    /// bits per second
    upload: f64,
    ping: f64,
    #[serde(default)]
    server: Option<SpeedtestServer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpeedtestServer {
    name: String,
    sponsor: String,
}

impl SpeedtestServer {
    fn display_name(&self) -> String {
        match (self.sponsor.trim(), self.name.trim()) {
            ("", "") => "Unknown".into(),
            ("", name) => name.into(),
            (sponsor, "") => sponsor.into(),
            (sponsor, name) => format!("{} ({})", sponsor, name),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Parse `speedtest-cli --json` output into Mbps / ms.
pub fn parse_speedtest_json(stdout: &[u8]) -> anyhow::Result<BenchmarkMeasurement> {
    let report: SpeedtestReport =
        serde_json::from_slice(stdout).context("unparseable speedtest-cli output")?;
    anyhow::ensure!(
        report.download.is_finite() && report.upload.is_finite() && report.ping.is_finite(),
        "speedtest-cli reported non-finite values"
    );
    Ok(BenchmarkMeasurement {
        download_mbps: round2(report.download.max(0.0) / 1_000_000.0),
        upload_mbps: round2(report.upload.max(0.0) / 1_000_000.0),
        ping_ms: round2(report.ping.max(0.0)),
        server_name: report.server.unwrap_or_default().display_name(),
    })
}

pub struct SpeedtestCli {
    command: String,
    args: Vec<String>,
}

impl SpeedtestCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec!["--json".into()],
        }
    }
}

impl BenchmarkRunner for SpeedtestCli {
    fn run(&self) -> BoxFuture<'_, anyhow::Result<BenchmarkMeasurement>> {
        Box::pin(async move {
            // kill_on_drop: an abandoned run must not leave the child behind.
            let output = Command::new(&self.command)
                .args(&self.args)
                .kill_on_drop(true)
                .output()
                .await
                .with_context(|| format!("failed to launch {}", self.command))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                anyhow::bail!("{} exited with {}: {}", self.command, output.status, stderr.trim());
            }
            parse_speedtest_json(&output.stdout)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bits_to_mbps_and_names_server() {
        let json = br#"{"download": 93456789.1, "upload": 11987654.3, "ping": 14.237,
            "server": {"name": "Frankfurt", "sponsor": "Example ISP", "id": "1"},
            "bytes_sent": 1, "bytes_received": 2}"#;
        let m = parse_speedtest_json(json).unwrap();
        assert_eq!(m.download_mbps, 93.46);
        assert_eq!(m.upload_mbps, 11.99);
        assert_eq!(m.ping_ms, 14.24);
        assert_eq!(m.server_name, "Example ISP (Frankfurt)");
    }

    #[test]
    fn missing_server_is_unknown() {
        let m = parse_speedtest_json(br#"{"download": 0, "upload": 0, "ping": 0}"#).unwrap();
        assert_eq!(m.server_name, "Unknown");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_speedtest_json(b"Retrieving speedtest.net configuration...").is_err());
    }

    #[tokio::test]
    async fn missing_binary_fails_with_message() {
        let err = SpeedtestCli::new("/nonexistent/speedtest-cli").run().await.unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }
}
