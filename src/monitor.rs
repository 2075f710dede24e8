//! Host-wide resource usage, independent of any container.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use utoipa::ToSchema;

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used: String,
    pub memory_total: String,
    pub disk_usage_percent: f64,
    pub timestamp: f64,
}

/// Samples CPU, memory and root-disk usage. Blocks for the CPU sampling interval,
/// so it runs on the blocking pool.
pub async fn collect_system_stats() -> Result<SystemStats> {
    tokio::task::spawn_blocking(sample_system)
        .await
        .context("System stats task failed")
}

fn sample_system() -> SystemStats {
    let mut sys = System::new();
    sys.refresh_cpu();
    // CPU usage is a delta between two refreshes
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    let used = sys.used_memory();
    let total = sys.total_memory();

    let disks = Disks::new_with_refreshed_list();
    let mounts: Vec<DiskUsage<'_>> = disks
        .list()
        .iter()
        .map(|d| DiskUsage {
            mount_point: d.mount_point(),
            total: d.total_space(),
            available: d.available_space(),
        })
        .collect();

    SystemStats {
        cpu_percent: round1(f64::from(sys.global_cpu_info().cpu_usage())),
        memory_percent: round1(percent(used, total)),
        memory_used: gigabytes(used),
        memory_total: gigabytes(total),
        disk_usage_percent: round1(root_disk_usage(&mounts)),
        timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0,
    }
}

struct DiskUsage<'a> {
    mount_point: &'a Path,
    total: u64,
    available: u64,
}

/// Usage of the disk mounted at `/`, or of the largest disk when no root mount is listed.
fn root_disk_usage(disks: &[DiskUsage<'_>]) -> f64 {
    let chosen = disks
        .iter()
        .find(|d| d.mount_point == Path::new("/"))
        .or_else(|| disks.iter().max_by_key(|d| d.total));

    match chosen {
        Some(d) => percent(d.total.saturating_sub(d.available), d.total),
        None => 0.0,
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn gigabytes(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GB)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
