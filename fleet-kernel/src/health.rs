use crate::inventory::Inventory;
use crate::lifecycle::BulkProbeReport;
use crate::state::Shared;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRun {
    pub finished_at: String, // RFC3339
    #[serde(flatten)]
    pub report: BulkProbeReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FleetHealth {
    pub uptime_seconds: u64,
    pub servers_tracked: u32,
    pub memory_usage_mb: f32,
    pub probe_runs: u32,
    pub last_probe: Option<ProbeRun>,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    probe_runs: Arc<AtomicU32>,
    last_probe: Arc<Mutex<Option<ProbeRun>>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            probe_runs: Arc::new(AtomicU32::new(0)),
            last_probe: Arc::new(Mutex::new(None)),
        }
    }

    pub fn record_bulk_probe(&self, report: &BulkProbeReport) {
        self.probe_runs.fetch_add(1, Ordering::Relaxed);
        let finished_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        *self.last_probe.lock() = Some(ProbeRun {
            finished_at,
            report: report.clone(),
        });
    }

    pub fn get_health(&self, inventory: &Shared<Inventory>) -> FleetHealth {
        FleetHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            servers_tracked: inventory.read().len() as u32,
            memory_usage_mb: get_memory_usage_mb(),
            probe_runs: self.probe_runs.load(Ordering::Relaxed),
            last_probe: self.last_probe.lock().clone(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/proc/{}/status", std::process::id());
        if let Ok(status) = std::fs::read_to_string(path) {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }

    // no procfs: rough figure
    12.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServerRecord;
    use crate::state::new_state;

    #[test]
    fn test_health_tracks_servers_and_probe_runs() {
        let mut inv = Inventory::new();
        inv.insert("O", "A", ServerRecord::new("s1")).unwrap();
        inv.insert("O", "B", ServerRecord::new("s2")).unwrap();
        let inventory = new_state(inv);

        let tracker = HealthTracker::new();
        let health = tracker.get_health(&inventory);
        assert_eq!(health.servers_tracked, 2);
        assert_eq!(health.probe_runs, 0);
        assert!(health.last_probe.is_none());

        let report = BulkProbeReport { probed: 2, online: 1, offline: 1, ..Default::default() };
        tracker.record_bulk_probe(&report);
        let health = tracker.clone().get_health(&inventory);
        assert_eq!(health.probe_runs, 1);
        assert_eq!(health.last_probe.unwrap().report, report);
        assert!(health.memory_usage_mb > 0.0);
    }
}
