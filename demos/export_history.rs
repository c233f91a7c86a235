// Dump a range of stored history as pretty JSON.
//
//   cargo run --example export_history -- data/netscope.db network 24
//
// Arguments: database path, kind (network|system|benchmark|event), hours back from now.

use netscope::export::{columns, export_range};
use netscope::history_repo::HistoryRepo;
use netscope::models::{SampleKind, now_ms};
use netscope::series::{SeriesConfig, SeriesStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "data/netscope.db".into());
    let kind: SampleKind = args
        .next()
        .unwrap_or_else(|| "network".into())
        .parse()
        .map_err(anyhow::Error::msg)?;
    let hours: u64 = args.next().map(|h| h.parse()).transpose()?.unwrap_or(24);

    let repo = Arc::new(HistoryRepo::connect(&path, 0).await?);
    repo.init().await?;
    let (_writer_shutdown_tx, writer_shutdown_rx) = tokio::sync::watch::channel(false);
    let (store, _writer) = SeriesStore::open(
        repo,
        SeriesConfig {
            window_secs: 300,
            max_window_samples: 1,
            flush_rate: 1,
            flush_interval_secs: 60,
        },
        writer_shutdown_rx,
    );

    let to = now_ms() + 1;
    let from = to.saturating_sub(hours * 60 * 60 * 1000);
    let records = export_range(&store, kind, from, to).await?;

    eprintln!("{} {} records; columns: {}", records.len(), kind, columns(kind).join(","));
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
