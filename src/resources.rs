// Host CPU, RAM, disk and uptime via sysinfo.
// Unreadable metrics degrade to zero and are reported as issues; a sample is always produced.

use crate::models::SystemSample;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Disks, System};
use tracing::instrument;

/// Something that could not be read this sample; the matching fields are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIssue {
    pub metric: &'static str,
    pub reason: String,
}

impl MetricIssue {
    fn new(metric: &'static str, reason: impl Into<String>) -> Self {
        Self {
            metric,
            reason: reason.into(),
        }
    }
}

/// Sample without a timestamp (filled in by the scheduler) plus anything that degraded.
#[derive(Debug, Clone, Default)]
pub struct ResourceReading {
    pub sample: SystemSample,
    pub issues: Vec<MetricIssue>,
}

/// Mount point plus capacity, as needed to pick the OS volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume<'a> {
    pub mount: &'a Path,
    pub total: u64,
    pub available: u64,
}

pub struct ResourceSampler {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    cpu_window: Duration,
}

impl ResourceSampler {
    /// `cpu_window` is raised to sysinfo's minimum refresh interval if shorter.
    pub fn new(cpu_window: Duration) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    #[instrument(skip(self), fields(operation = "sample_resources"))]
    pub async fn sample(&self) -> ResourceReading {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let cpu_window = self.cpu_window;
        tokio::task::spawn_blocking(move || read_resources(&sys, &disks, cpu_window))
            .await
            .unwrap_or_else(|e| ResourceReading {
                sample: SystemSample::default(),
                issues: vec![MetricIssue::new("resources", format!("sampler task join: {}", e))],
            })
    }
}

fn read_resources(sys: &Mutex<System>, disks: &Mutex<Disks>, cpu_window: Duration) -> ResourceReading {
    let mut reading = ResourceReading::default();

    match sys.lock() {
        Ok(mut sys) => {
            // Two refreshes a fixed window apart: usage over the window, not an instant spike.
            sys.refresh_cpu_usage();
            std::thread::sleep(cpu_window);
            sys.refresh_cpu_usage();
            if sys.cpus().is_empty() {
                reading.issues.push(MetricIssue::new("cpu", "no CPUs reported"));
            } else {
                reading.sample.cpu_percent = (sys.global_cpu_usage() as f64).clamp(0.0, 100.0);
            }

            sys.refresh_memory();
            let total = sys.total_memory();
            if total == 0 {
                reading.issues.push(MetricIssue::new("ram", "total memory reported as 0"));
            } else {
                let used = total.saturating_sub(sys.available_memory());
                reading.sample.ram_total_bytes = total;
                reading.sample.ram_used_bytes = used;
                reading.sample.ram_percent = percent(used, total);
            }
        }
        Err(e) => {
            let reason = format!("sysinfo lock poisoned: {}", e);
            reading.issues.push(MetricIssue::new("cpu", reason.clone()));
            reading.issues.push(MetricIssue::new("ram", reason));
        }
    }

    match disks.lock() {
        Ok(mut disks) => {
            disks.refresh(true);
            let volumes: Vec<Volume<'_>> = disks
                .list()
                .iter()
                .map(|d| Volume {
                    mount: d.mount_point(),
                    total: d.total_space(),
                    available: d.available_space(),
                })
                .collect();
            match pick_os_volume(&volumes) {
                Some(v) => {
                    let used = v.total.saturating_sub(v.available);
                    reading.sample.disk_total_bytes = v.total;
                    reading.sample.disk_used_bytes = used;
                    reading.sample.disk_percent = percent(used, v.total);
                }
                None => reading
                    .issues
                    .push(MetricIssue::new("disk", "no readable volume for the OS partition")),
            }
        }
        Err(e) => reading
            .issues
            .push(MetricIssue::new("disk", format!("sysinfo disks lock poisoned: {}", e))),
    }

    let uptime = System::uptime();
    if uptime == 0 {
        reading.issues.push(MetricIssue::new("uptime", "uptime reported as 0"));
    }
    reading.sample.uptime_seconds = uptime;

    reading
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Volume hosting the OS: `/`, else `C:\`, else the first volume with a capacity.
pub fn pick_os_volume<'a, 'b>(volumes: &'b [Volume<'a>]) -> Option<&'b Volume<'a>> {
    volumes
        .iter()
        .filter(has_capacity)
        .find(|v| v.mount == Path::new("/"))
        .or_else(|| {
            volumes
                .iter()
                .filter(has_capacity)
                .find(|v| v.mount.to_string_lossy().eq_ignore_ascii_case("C:\\"))
        })
        .or_else(|| volumes.iter().find(has_capacity))
}

fn has_capacity(v: &&Volume<'_>) -> bool {
    v.total > 0
}
