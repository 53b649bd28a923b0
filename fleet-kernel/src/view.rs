//! Rendering-agnostic dashboard model: filter results grouped into waves.

use crate::filter::{filter, FilterSpec};
use crate::inventory::Inventory;
use crate::kpi::calculate_progress;
use crate::sequence::{plan_waves, SequenceBucket};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    pub application: String,
    pub sequence_buckets: Vec<SequenceBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerView {
    pub owner: String,
    pub applications: Vec<ApplicationView>,
}

/// What `/status` returns: the filtered view plus fleet-wide progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub owners: Vec<OwnerView>,
    pub progress: u8,
}

pub fn build_view(inventory: &Inventory, spec: &FilterSpec) -> Vec<OwnerView> {
    filter(inventory, spec)
        .into_iter()
        .map(|owner| OwnerView {
            owner: owner.owner,
            applications: owner
                .applications
                .into_iter()
                .map(|app| ApplicationView {
                    sequence_buckets: plan_waves(&app.records),
                    application: app.application,
                })
                .collect(),
        })
        .collect()
}

/// Progress is computed over the whole inventory, not the filtered view.
pub fn dashboard(inventory: &Inventory, spec: &FilterSpec) -> Dashboard {
    Dashboard {
        owners: build_view(inventory, spec),
        progress: calculate_progress(inventory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ServerRecord, ServerStatus};

    fn allowed(view: &[OwnerView], server: &str) -> Option<bool> {
        view.iter()
            .flat_map(|o| o.applications.iter())
            .flat_map(|a| a.sequence_buckets.iter())
            .flat_map(|b| b.records.iter())
            .find(|g| g.record.server == server)
            .map(|g| g.shutdown_allowed)
    }

    fn inventory() -> Inventory {
        let mut inv = Inventory::new();
        inv.insert("O", "A", ServerRecord::new("db").with_sequence(0)).unwrap();
        inv.insert("O", "A", ServerRecord::new("app").with_sequence(1)).unwrap();
        inv.insert("O", "B", ServerRecord::new("solo").with_sequence(3).with_status(ServerStatus::Offline))
            .unwrap();
        inv
    }

    #[test]
    fn test_view_groups_and_gates() {
        let view = build_view(&inventory(), &FilterSpec::default());
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].applications.len(), 2);
        assert_eq!(allowed(&view, "db"), Some(true));
        assert_eq!(allowed(&view, "app"), Some(false));
        assert_eq!(allowed(&view, "solo"), Some(true));
    }

    #[test]
    fn test_filter_hides_lower_wave_and_changes_gate() {
        let spec = FilterSpec::default().server("app");
        let view = build_view(&inventory(), &spec);
        assert_eq!(allowed(&view, "db"), None);
        assert_eq!(allowed(&view, "app"), Some(true));
    }

    #[test]
    fn test_empty_groups_are_not_rendered() {
        let spec = FilterSpec::default().status("offline");
        let view = build_view(&inventory(), &spec);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].applications.len(), 1);
        assert_eq!(view[0].applications[0].application, "B");
    }

    #[test]
    fn test_dashboard_progress_ignores_filter() {
        let board = dashboard(&inventory(), &FilterSpec::default().status("online"));
        assert_eq!(board.progress, 33);
    }

    #[test]
    fn test_dashboard_serializes_flat_records() {
        let board = dashboard(&inventory(), &FilterSpec::default().server("db"));
        let json = serde_json::to_value(&board).unwrap();
        let record = &json["owners"][0]["applications"][0]["sequence_buckets"][0]["records"][0];
        assert_eq!(record["server"], "db");
        assert_eq!(record["status"], "online");
        assert_eq!(record["shutdown_allowed"], true);
    }
}
