// SeriesStore tests: live windows, durable writer batching and shutdown flush, failure isolation

mod common;

use common::*;
use netscope::history_repo::HistoryRepo;
use netscope::models::*;
use netscope::series::{SeriesConfig, SeriesStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

fn config(flush_rate: u64) -> SeriesConfig {
    SeriesConfig {
        window_secs: 30,
        max_window_samples: 1000,
        flush_rate,
        flush_interval_secs: 60,
    }
}

fn timestamps(samples: &[Sample]) -> Vec<u64> {
    samples.iter().map(Sample::timestamp).collect()
}

#[tokio::test]
async fn live_window_trims_relative_to_newest_sample() {
    let (_dir, repo) = temp_repo().await;
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (store, _writer) = SeriesStore::open(repo, config(100), stop_rx);

    for ts in [0, 10_000, 20_000, 30_000, 40_000] {
        store.append(Sample::System(system_sample(ts)));
    }
    assert_eq!(
        timestamps(&store.query(SampleKind::System, 30)),
        vec![10_000, 20_000, 30_000, 40_000]
    );
    assert_eq!(
        timestamps(&store.query(SampleKind::System, 10)),
        vec![30_000, 40_000]
    );
    assert_eq!(timestamps(&store.recent(SampleKind::System, 2)), vec![30_000, 40_000]);
    assert!(store.query(SampleKind::Network, 30).is_empty());
}

#[tokio::test]
async fn length_cap_inside_window_is_counted() {
    let (_dir, repo) = temp_repo().await;
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (store, _writer) = SeriesStore::open(
        repo,
        SeriesConfig {
            window_secs: 86_400,
            max_window_samples: 3,
            flush_rate: 100,
            flush_interval_secs: 60,
        },
        stop_rx,
    );
    for ts in [1000, 2000, 3000] {
        store.append(Sample::System(system_sample(ts)));
    }
    assert_eq!(store.window_capped_total(), 0);
    store.append(Sample::System(system_sample(4000)));
    store.append(Sample::System(system_sample(5000)));
    assert_eq!(store.window_capped_total(), 2);
    assert_eq!(
        timestamps(&store.query(SampleKind::System, 86_400)),
        vec![3000, 4000, 5000]
    );
}

#[tokio::test]
async fn window_change_applies_on_next_append() {
    let (_dir, repo) = temp_repo().await;
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (store, _writer) = SeriesStore::open(repo, config(100), stop_rx);
    store.set_window_secs(300);
    assert_eq!(store.window_secs(), 300);

    for ts in [0, 100_000, 200_000] {
        store.append(Sample::System(system_sample(ts)));
    }
    store.set_window_secs(30);
    assert_eq!(store.recent(SampleKind::System, 10).len(), 3);
    store.append(Sample::System(system_sample(210_000)));
    assert_eq!(
        timestamps(&store.recent(SampleKind::System, 10)),
        vec![200_000, 210_000]
    );
}

#[tokio::test]
async fn writer_flushes_when_batch_is_full() {
    let (_dir, repo) = temp_repo().await;
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (store, _writer) = SeriesStore::open(repo.clone(), config(3), stop_rx);

    for ts in [1000, 2000, 3000] {
        store.append(Sample::Network(network_sample(ts, "eth0")));
    }
    assert!(eventually(Duration::from_secs(3), || store.saved_total() == 3).await);
    let history = store.history(SampleKind::Network, 0, 10_000).await.unwrap();
    assert_eq!(timestamps(&history), vec![1000, 2000, 3000]);
    assert_eq!(store.write_failures(), 0);
}

#[tokio::test]
async fn shutdown_drains_and_flushes_partial_batch() {
    let (_dir, repo) = temp_repo().await;
    let (stop_tx, stop_rx) = watch::channel(false);
    let (store, writer) = SeriesStore::open(repo.clone(), config(100), stop_rx);

    store.append(Sample::System(system_sample(1000)));
    store.append(Sample::Event(event(1500, EventKind::Startup, "up")));
    store.append(Sample::System(system_sample(2000)));
    stop_tx.send_replace(true);
    tokio::time::timeout(Duration::from_secs(5), writer)
        .await
        .expect("writer stops")
        .unwrap();

    assert_eq!(repo.count(SampleKind::System).await.unwrap(), 2);
    assert_eq!(repo.count(SampleKind::Event).await.unwrap(), 1);
    assert_eq!(store.saved_total(), 3);

    // After the writer is gone appends still reach memory, and the loss is reported once.
    store.append(Sample::System(system_sample(3000)));
    store.append(Sample::System(system_sample(4000)));
    assert_eq!(store.recent(SampleKind::System, 10).len(), 4);
    let failures: Vec<Sample> = store
        .recent(SampleKind::Event, 10)
        .into_iter()
        .filter(|s| matches!(s, Sample::Event(e) if e.kind == EventKind::StorageWriteFailed))
        .collect();
    assert_eq!(failures.len(), 1);
}

#[tokio::test]
async fn durable_failure_does_not_touch_live_window() {
    // Connected but never initialized: every insert fails with "no such table".
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.db");
    let repo = Arc::new(HistoryRepo::connect(path.to_str().unwrap(), 0).await.unwrap());
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (store, _writer) = SeriesStore::open(repo, config(1), stop_rx);

    store.append(Sample::System(system_sample(1000)));
    store.append(Sample::System(system_sample(2000)));

    assert!(eventually(Duration::from_secs(3), || store.write_failures() >= 2).await);
    assert_eq!(
        timestamps(&store.recent(SampleKind::System, 10)),
        vec![1000, 2000]
    );
    let events = store.recent(SampleKind::Event, 10);
    assert!(!events.is_empty());
    for sample in events {
        match sample {
            Sample::Event(e) => {
                assert_eq!(e.kind, EventKind::StorageWriteFailed);
                assert_eq!(e.level, EventLevel::Error);
                assert!(!e.message.is_empty());
            }
            other => panic!("unexpected sample {:?}", other),
        }
    }
    assert_eq!(store.saved_total(), 0);
}

#[tokio::test]
async fn concurrent_appenders_lose_nothing() {
    let (_dir, repo) = temp_repo().await;
    let (stop_tx, stop_rx) = watch::channel(false);
    let (store, writer) = SeriesStore::open(
        repo.clone(),
        SeriesConfig {
            window_secs: 86_400,
            max_window_samples: 10_000,
            flush_rate: 16,
            flush_interval_secs: 1,
        },
        stop_rx,
    );

    let mut tasks = Vec::new();
    for worker in 0..4u64 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..25u64 {
                store.append(Sample::System(system_sample(worker * 1000 + i)));
                tokio::task::yield_now().await;
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(store.recent(SampleKind::System, 1000).len(), 100);

    stop_tx.send_replace(true);
    writer.await.unwrap();
    assert_eq!(repo.count(SampleKind::System).await.unwrap(), 100);
}
