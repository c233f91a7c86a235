// Background maintenance: prune rows past the retention period, VACUUM on a schedule
// (cron expression in local time, or a fixed interval).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::history_repo::HistoryRepo;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

/// When VACUUM runs next.
#[derive(Debug)]
enum VacuumPlan {
    /// Cron expression evaluated in local time.
    Cron(cron::Schedule),
    Every(Duration),
    Off,
}

impl VacuumPlan {
    fn from_config(config: &MaintenanceConfig) -> Self {
        match config.vacuum_schedule.as_deref() {
            Some(expr) => match cron::Schedule::from_str(expr) {
                Ok(schedule) => VacuumPlan::Cron(schedule),
                Err(e) => {
                    warn!(cron = %expr, error = %e, "invalid vacuum_schedule; VACUUM disabled");
                    VacuumPlan::Off
                }
            },
            None => VacuumPlan::Every(Duration::from_secs(config.vacuum_interval_secs.max(1))),
        }
    }

    /// Delay from `now` until the next run; None when nothing is scheduled.
    fn delay_from(&self, now: chrono::DateTime<chrono::Local>) -> Option<Duration> {
        match self {
            VacuumPlan::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO)),
            VacuumPlan::Every(period) => Some(*period),
            VacuumPlan::Off => None,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.delay_from(chrono::Local::now())
            .map(|delay| Instant::now() + delay)
    }
}

pub fn spawn(
    repo: Arc<HistoryRepo>,
    config: MaintenanceConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(repo, config, shutdown_rx))
}

#[instrument(skip(repo, shutdown_rx), fields(prune_interval_secs = config.prune_interval_secs))]
async fn run(repo: Arc<HistoryRepo>, config: MaintenanceConfig, mut shutdown_rx: watch::Receiver<bool>) {
    let mut prune_tick = tokio::time::interval(Duration::from_secs(config.prune_interval_secs.max(1)));
    prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut rows_pruned_total: u64 = 0;

    let plan = VacuumPlan::from_config(&config);
    let mut vacuum_at = plan.next_deadline();
    debug!(?plan, "Maintenance worker started");

    loop {
        tokio::select! {
            _ = prune_tick.tick() => {
                match repo.prune_old_data().await {
                    Ok(n) => {
                        rows_pruned_total += n;
                        debug!(rows_pruned = n, rows_pruned_total, operation = "prune_old_data", "Old data pruned");
                    }
                    Err(e) => warn!(error = %e, operation = "prune_old_data", "Failed to prune old data"),
                }
            }
            _ = sleep_until_or_never(vacuum_at) => {
                match repo.vacuum().await {
                    Ok(()) => info!(operation = "vacuum", "vacuum complete"),
                    Err(e) => warn!(error = %e, operation = "vacuum", "vacuum failed"),
                }
                vacuum_at = plan.next_deadline();
            }
            _ = shutdown_rx.changed() => {
                debug!("Maintenance worker shutting down");
                break;
            }
        }
    }
}

async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
