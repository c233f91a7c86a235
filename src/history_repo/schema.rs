// Table definitions and additive migrations.
// Base tables are the v1 layout; each migration only adds nullable columns so
// rows written by older versions stay readable by range queries.

use sqlx::SqlitePool;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 2;

const CREATE_TABLES: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS network_samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        interface_name TEXT NOT NULL,
        bytes_sent INTEGER NOT NULL,
        bytes_recv INTEGER NOT NULL,
        packets_sent INTEGER NOT NULL,
        packets_recv INTEGER NOT NULL,
        upload_rate_bps REAL NOT NULL,
        download_rate_bps REAL NOT NULL,
        latency_ms REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS system_samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        cpu_percent REAL NOT NULL,
        ram_percent REAL NOT NULL,
        ram_used_bytes INTEGER NOT NULL,
        ram_total_bytes INTEGER NOT NULL,
        disk_percent REAL NOT NULL,
        disk_used_bytes INTEGER NOT NULL,
        disk_total_bytes INTEGER NOT NULL,
        uptime_seconds INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS benchmark_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        download_mbps REAL NOT NULL,
        upload_mbps REAL NOT NULL,
        ping_ms REAL NOT NULL,
        server_name TEXT NOT NULL,
        succeeded INTEGER NOT NULL,
        error_message TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL
    )
    "#,
];

const CREATE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_network_samples_ts ON network_samples(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_system_samples_ts ON system_samples(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_benchmark_results_ts ON benchmark_results(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_events_ts ON events(timestamp)",
];

/// (target version, statements)
const MIGRATIONS: [(i64, &[&str]); 1] = [(
    2,
    &[
        "ALTER TABLE network_samples ADD COLUMN link_speed INTEGER",
        "ALTER TABLE network_samples ADD COLUMN geo_data BLOB",
    ],
)];

pub(super) async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
    )
    .execute(pool)
    .await?;

    for stmt in CREATE_TABLES.iter().chain(CREATE_INDEXES.iter()) {
        sqlx::query(stmt).execute(pool).await?;
    }

    let current = current_version(pool).await?;
    for (version, statements) in MIGRATIONS {
        if version <= current {
            continue;
        }
        let mut tx = pool.begin().await?;
        for stmt in statements {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        set_version(&mut tx, version).await?;
        tx.commit().await?;
        info!(from = current, to = version, "history schema migrated");
    }
    Ok(())
}

/// 0 when no version row exists yet (fresh or pre-versioning file); base tables are v1 then.
pub(super) async fn current_version(pool: &SqlitePool) -> anyhow::Result<i64> {
    let v = sqlx::query_scalar::<_, i64>("SELECT value FROM schema_version WHERE key = 'schema'")
        .fetch_optional(pool)
        .await?;
    Ok(v.unwrap_or(0))
}

async fn set_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    version: i64,
) -> anyhow::Result<()> {
    sqlx::query("INSERT OR REPLACE INTO schema_version (key, value) VALUES ('schema', $1)")
        .bind(version)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
