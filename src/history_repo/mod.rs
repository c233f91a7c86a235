// SQLite durable store: one append-only table per record kind, queried by time range.
// Uses sqlx for async + connection pooling. Optional geo info is a versioned wincode BLOB.

mod blob;
mod schema;

pub use schema::SCHEMA_VERSION;

use crate::models::{
    BenchmarkResult, Event, EventKind, EventLevel, GeoInfo, NetworkSample, Sample, SampleKind,
    SystemSample,
};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

const NETWORK_COLUMNS: &str = "timestamp, interface_name, bytes_sent, bytes_recv, packets_sent, packets_recv, upload_rate_bps, download_rate_bps, latency_ms, link_speed, geo_data";
const SYSTEM_COLUMNS: &str = "timestamp, cpu_percent, ram_percent, ram_used_bytes, ram_total_bytes, disk_percent, disk_used_bytes, disk_total_bytes, uptime_seconds";
const BENCHMARK_COLUMNS: &str =
    "timestamp, download_mbps, upload_mbps, ping_ms, server_name, succeeded, error_message";
const EVENT_COLUMNS: &str = "timestamp, event_type, level, message";

fn table(kind: SampleKind) -> &'static str {
    match kind {
        SampleKind::Network => "network_samples",
        SampleKind::System => "system_samples",
        SampleKind::Benchmark => "benchmark_results",
        SampleKind::Event => "events",
    }
}

fn columns(kind: SampleKind) -> &'static str {
    match kind {
        SampleKind::Network => NETWORK_COLUMNS,
        SampleKind::System => SYSTEM_COLUMNS,
        SampleKind::Benchmark => BENCHMARK_COLUMNS,
        SampleKind::Event => EVENT_COLUMNS,
    }
}

pub struct HistoryRepo {
    pool: SqlitePool,
    retention_ms: i64,
}

impl HistoryRepo {
    /// `retention_days == 0` keeps everything.
    pub async fn connect(path: &str, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let retention_ms = (retention_days as i64) * 24 * 60 * 60 * 1000;
        Ok(Self { pool, retention_ms })
    }

    /// Create tables and apply pending migrations. Idempotent.
    pub async fn init(&self) -> anyhow::Result<()> {
        schema::init(&self.pool).await
    }

    pub async fn schema_version(&self) -> anyhow::Result<i64> {
        schema::current_version(&self.pool).await
    }

    /// Write a batch in one transaction; all or nothing.
    #[instrument(skip(self, samples), fields(repo = "history", operation = "save_samples", samples_count = samples.len()))]
    pub async fn save_samples(&self, samples: &[Sample]) -> anyhow::Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for sample in samples {
            match sample {
                Sample::Network(s) => {
                    let geo_data = match &s.geo {
                        Some(geo) => Some(blob::with_version_prefix(
                            blob::GEO_BLOB_VERSION,
                            wincode::serialize(geo)
                                .map_err(|e| anyhow::anyhow!("wincode geo: {}", e))?,
                        )),
                        None => None,
                    };
                    sqlx::query(
                        "INSERT INTO network_samples (timestamp, interface_name, bytes_sent, bytes_recv, packets_sent, packets_recv, upload_rate_bps, download_rate_bps, latency_ms, link_speed, geo_data) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                    )
                    .bind(s.timestamp as i64)
                    .bind(&s.interface_name)
                    .bind(s.bytes_sent as i64)
                    .bind(s.bytes_recv as i64)
                    .bind(s.packets_sent as i64)
                    .bind(s.packets_recv as i64)
                    .bind(s.upload_rate_bps)
                    .bind(s.download_rate_bps)
                    .bind(s.latency_ms)
                    .bind(s.link_speed.map(|v| v as i64))
                    .bind(geo_data)
                    .execute(&mut *tx)
                    .await?;
                }
                Sample::System(s) => {
                    sqlx::query(
                        "INSERT INTO system_samples (timestamp, cpu_percent, ram_percent, ram_used_bytes, ram_total_bytes, disk_percent, disk_used_bytes, disk_total_bytes, uptime_seconds) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                    )
                    .bind(s.timestamp as i64)
                    .bind(s.cpu_percent)
                    .bind(s.ram_percent)
                    .bind(s.ram_used_bytes as i64)
                    .bind(s.ram_total_bytes as i64)
                    .bind(s.disk_percent)
                    .bind(s.disk_used_bytes as i64)
                    .bind(s.disk_total_bytes as i64)
                    .bind(s.uptime_seconds as i64)
                    .execute(&mut *tx)
                    .await?;
                }
                Sample::Benchmark(r) => {
                    sqlx::query(
                        "INSERT INTO benchmark_results (timestamp, download_mbps, upload_mbps, ping_ms, server_name, succeeded, error_message) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    )
                    .bind(r.timestamp as i64)
                    .bind(r.download_mbps)
                    .bind(r.upload_mbps)
                    .bind(r.ping_ms)
                    .bind(&r.server_name)
                    .bind(r.succeeded)
                    .bind(r.error_message.as_deref())
                    .execute(&mut *tx)
                    .await?;
                }
                Sample::Event(e) => {
                    sqlx::query(
                        "INSERT INTO events (timestamp, event_type, level, message) VALUES ($1, $2, $3, $4)",
                    )
                    .bind(e.timestamp as i64)
                    .bind(e.kind.as_str())
                    .bind(e.level.as_str())
                    .bind(&e.message)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Records of `kind` with `from_ts <= timestamp < to_ts`, ascending by time then insertion.
    #[instrument(skip(self), fields(repo = "history", operation = "get_range"))]
    pub async fn get_range(
        &self,
        kind: SampleKind,
        from_ts: u64,
        to_ts: u64,
    ) -> anyhow::Result<Vec<Sample>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE timestamp >= $1 AND timestamp < $2 ORDER BY timestamp ASC, id ASC",
            columns(kind),
            table(kind)
        );
        let rows = sqlx::query(&sql)
            .bind(ts_bound(from_ts))
            .bind(ts_bound(to_ts))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| parse_row(kind, row)).collect()
    }

    /// Newest `limit` records of `kind`, returned oldest first.
    #[instrument(skip(self), fields(repo = "history", operation = "get_recent"))]
    pub async fn get_recent(&self, kind: SampleKind, limit: u32) -> anyhow::Result<Vec<Sample>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY timestamp DESC, id DESC LIMIT $1",
            columns(kind),
            table(kind)
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut out = rows
            .iter()
            .map(|row| parse_row(kind, row))
            .collect::<anyhow::Result<Vec<_>>>()?;
        out.reverse();
        Ok(out)
    }

    pub async fn count(&self, kind: SampleKind) -> anyhow::Result<u64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table(kind)))
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    /// Delete rows older than the retention period. No-op when retention is disabled.
    #[instrument(skip(self), fields(repo = "history", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        if self.retention_ms <= 0 {
            return Ok(0);
        }
        let cutoff = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_millis() as i64)
            - self.retention_ms;
        let mut removed = 0;
        for kind in SampleKind::ALL {
            let r = sqlx::query(&format!("DELETE FROM {} WHERE timestamp < $1", table(kind)))
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
            removed += r.rows_affected();
        }
        Ok(removed)
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "history", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite integers are i64; bounds past i64::MAX clamp instead of wrapping negative.
fn ts_bound(ts: u64) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}

fn parse_row(kind: SampleKind, row: &SqliteRow) -> anyhow::Result<Sample> {
    Ok(match kind {
        SampleKind::Network => Sample::Network(parse_network_row(row)?),
        SampleKind::System => Sample::System(parse_system_row(row)?),
        SampleKind::Benchmark => Sample::Benchmark(parse_benchmark_row(row)?),
        SampleKind::Event => Sample::Event(parse_event_row(row)?),
    })
}

fn parse_network_row(row: &SqliteRow) -> anyhow::Result<NetworkSample> {
    let geo_data: Option<Vec<u8>> = row.try_get("geo_data")?;
    let link_speed: Option<i64> = row.try_get("link_speed")?;
    Ok(NetworkSample {
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
        interface_name: row.try_get("interface_name")?,
        bytes_sent: row.try_get::<i64, _>("bytes_sent")? as u64,
        bytes_recv: row.try_get::<i64, _>("bytes_recv")? as u64,
        packets_sent: row.try_get::<i64, _>("packets_sent")? as u64,
        packets_recv: row.try_get::<i64, _>("packets_recv")? as u64,
        upload_rate_bps: row.try_get("upload_rate_bps")?,
        download_rate_bps: row.try_get("download_rate_bps")?,
        latency_ms: row.try_get("latency_ms")?,
        link_speed: link_speed.map(|v| v as u64),
        geo: geo_data.as_deref().and_then(deserialize_geo),
    })
}

/// Unknown blob versions or corrupt payloads read as "no geo info" rather than failing the query.
fn deserialize_geo(bytes: &[u8]) -> Option<GeoInfo> {
    let payload = blob::blob_payload(bytes, blob::GEO_BLOB_VERSION)?;
    wincode::deserialize(payload)
        .map_err(|e| {
            tracing::debug!(error = %e, "wincode deserialize geo (corrupt), skipping");
        })
        .ok()
}

fn parse_system_row(row: &SqliteRow) -> anyhow::Result<SystemSample> {
    Ok(SystemSample {
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
        cpu_percent: row.try_get("cpu_percent")?,
        ram_percent: row.try_get("ram_percent")?,
        ram_used_bytes: row.try_get::<i64, _>("ram_used_bytes")? as u64,
        ram_total_bytes: row.try_get::<i64, _>("ram_total_bytes")? as u64,
        disk_percent: row.try_get("disk_percent")?,
        disk_used_bytes: row.try_get::<i64, _>("disk_used_bytes")? as u64,
        disk_total_bytes: row.try_get::<i64, _>("disk_total_bytes")? as u64,
        uptime_seconds: row.try_get::<i64, _>("uptime_seconds")? as u64,
    })
}

fn parse_benchmark_row(row: &SqliteRow) -> anyhow::Result<BenchmarkResult> {
    Ok(BenchmarkResult {
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
        download_mbps: row.try_get("download_mbps")?,
        upload_mbps: row.try_get("upload_mbps")?,
        ping_ms: row.try_get("ping_ms")?,
        server_name: row.try_get("server_name")?,
        succeeded: row.try_get("succeeded")?,
        error_message: row.try_get("error_message")?,
    })
}

fn parse_event_row(row: &SqliteRow) -> anyhow::Result<Event> {
    let kind: String = row.try_get("event_type")?;
    let level: String = row.try_get("level")?;
    Ok(Event {
        timestamp: row.try_get::<i64, _>("timestamp")? as u64,
        kind: EventKind::from_db(&kind),
        level: EventLevel::from_db(&level),
        message: row.try_get("message")?,
    })
}
