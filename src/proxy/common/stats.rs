// Request accounting for the dashboard

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Payload of `GET /api/stats`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub uptime: String,
    pub memory: String,
    pub host: String,
}

/// Process-wide counters. Created once at startup and injected into the dispatcher.
pub struct StatsRegistry {
    total_requests: AtomicU64,
    start_time: Instant,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count one admitted request
    pub fn increment(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.total_requests(),
            uptime: format_uptime(self.uptime()),
            memory: format!("{} MB", resident_memory_mb()),
            host: System::host_name().unwrap_or_default(),
        }
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// "{hours}h {minutes}m", truncated
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

/// Resident set size of this process, rounded to whole megabytes
fn resident_memory_mb() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        ProcessRefreshKind::new().with_memory(),
    );

    system
        .process(pid)
        .map(|p| bytes_to_rounded_mb(p.memory()))
        .unwrap_or(0)
}

fn bytes_to_rounded_mb(bytes: u64) -> u64 {
    (bytes as f64 / 1024.0 / 1024.0).round() as u64
}
