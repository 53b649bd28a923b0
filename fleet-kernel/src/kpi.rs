use crate::inventory::Inventory;
use serde::Serialize;
use std::collections::HashSet;

/// Fleet-wide counters for the KPI view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Kpi {
    pub total_servers: u32,
    /// Distinct (owner, application) pairs.
    pub total_applications: u32,
    pub online: u32,
    /// `offline` and `shutdown` together.
    pub offline: u32,
    pub pingable: u32,
    pub non_pingable: u32,
}

pub fn compute_kpi(inventory: &Inventory) -> Kpi {
    let mut kpi = Kpi::default();
    let mut applications = HashSet::new();

    for (owner, application, record) in inventory.all_records() {
        applications.insert((owner, application));
        kpi.total_servers += 1;
        if record.status.is_online() {
            kpi.online += 1;
        } else if record.status.is_down() {
            kpi.offline += 1;
        }
        if record.pingable.is_yes() {
            kpi.pingable += 1;
        } else {
            kpi.non_pingable += 1;
        }
    }

    kpi.total_applications = applications.len() as u32;
    kpi
}

/// Percentage (0-100, rounded half up) of servers that are offline or shut down.
pub fn calculate_progress(inventory: &Inventory) -> u8 {
    let (total, down) = inventory
        .all_records()
        .fold((0u64, 0u64), |(total, down), (_, _, record)| {
            (total + 1, down + u64::from(record.status.is_down()))
        });
    if total == 0 {
        return 0;
    }
    ((down * 200 + total) / (total * 2)) as u8
}
