//! Host health snapshot for the `/system` endpoint.
//!
//! Backed by `sysinfo`; a reading that cannot be taken is reported as null
//! rather than failing the request.

use std::path::Path;

use serde::Serialize;
use sysinfo::{Components, Disks, System};

const BYTES_PER_GB: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub disk: Option<DiskStatus>,
    pub memory: MemoryStatus,
    pub cpu_load: CpuLoad,
    pub temperature: Option<f32>,
}

/// Usage of the filesystem holding the log directory.
#[derive(Debug, Clone, Serialize)]
pub struct DiskStatus {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatus {
    pub total_gb: f64,
    pub available_gb: f64,
    pub free_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuLoad {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

pub fn snapshot(log_dir: &Path) -> SystemStatus {
    SystemStatus {
        disk: disk_status(log_dir),
        memory: memory_status(),
        cpu_load: cpu_load(),
        temperature: temperature(),
    }
}

/// Stats for the mounted filesystem whose mount point is the longest prefix
/// of the log directory.
fn disk_status(log_dir: &Path) -> Option<DiskStatus> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .iter()
        .filter(|d| log_dir.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())?;

    let total = disk.total_space();
    let free = disk.available_space();
    Some(DiskStatus {
        total_gb: total as f64 / BYTES_PER_GB,
        used_gb: total.saturating_sub(free) as f64 / BYTES_PER_GB,
        free_gb: free as f64 / BYTES_PER_GB,
    })
}

fn memory_status() -> MemoryStatus {
    let mut sys = System::new();
    sys.refresh_memory();
    MemoryStatus {
        total_gb: sys.total_memory() as f64 / BYTES_PER_GB,
        available_gb: sys.available_memory() as f64 / BYTES_PER_GB,
        free_gb: sys.free_memory() as f64 / BYTES_PER_GB,
    }
}

fn cpu_load() -> CpuLoad {
    let load = System::load_average();
    CpuLoad {
        one_min: load.one,
        five_min: load.five,
        fifteen_min: load.fifteen,
    }
}

/// Hottest sensor reading, if the host exposes any.
fn temperature() -> Option<f32> {
    let components = Components::new_with_refreshed_list();
    components
        .iter()
        .map(|c| c.temperature())
        .filter(|t| t.is_finite() && *t > 0.0)
        .max_by(|a, b| a.total_cmp(b))
}
