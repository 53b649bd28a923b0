/**
 * LIFECYCLE - Guarded status transitions on the shared inventory
 *
 * ROLE:
 * The single entry point for operations that mutate a server: initiate
 * shutdown, probe one / probe all, edit (move) and delete. HTTP handlers
 * and tests go through `Fleet`, never through the inventory directly.
 *
 * TRANSITIONS:
 * - initiate_shutdown: anything but offline/shutdown -> shutdown
 * - probe: observed reachability -> online | offline (failure = offline)
 * - edit / delete: unconditional, no wave gate
 *
 * GATE POLICY:
 * `Advisory` only annotates the dashboard. `Enforced` also re-checks the
 * wave gate on the full group inside `initiate_shutdown`.
 */

use crate::error::{FleetError, FleetResult};
use crate::inventory::Inventory;
use crate::models::{InventoryRow, RecordPatch, ServerKey, ServerRecord, ServerStatus};
use crate::probe::{probe_isolated, LivenessProbe, ProbeError};
use crate::sequence::blocking_servers;
use crate::state::Shared;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    #[default]
    Advisory,
    Enforced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    #[serde(flatten)]
    pub key: ServerKey,
    pub status: ServerStatus,
    /// Probe error recovered to `offline`, if any.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkProbeReport {
    pub probed: u32,
    pub online: u32,
    pub offline: u32,
    /// Probes that errored or timed out (already counted in `offline`).
    pub failures: u32,
    /// Records deleted or moved while their probe was in flight.
    pub skipped: u32,
}

impl BulkProbeReport {
    fn record(&mut self, outcome: &ProbeOutcome) {
        self.probed += 1;
        if outcome.status.is_online() {
            self.online += 1;
        } else {
            self.offline += 1;
        }
        if outcome.error.is_some() {
            self.failures += 1;
        }
    }
}

#[derive(Clone)]
pub struct Fleet {
    inventory: Shared<Inventory>,
    probe: Arc<dyn LivenessProbe>,
    probe_timeout: Duration,
    gate: GatePolicy,
}

impl Fleet {
    pub fn new(inventory: Shared<Inventory>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            inventory,
            probe,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            gate: GatePolicy::default(),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_gate_policy(mut self, gate: GatePolicy) -> Self {
        self.gate = gate;
        self
    }

    pub fn inventory(&self) -> &Shared<Inventory> {
        &self.inventory
    }

    pub fn gate_policy(&self) -> GatePolicy {
        self.gate
    }

    /// Replaces the whole inventory (CSV import). Returns accepted rows.
    pub fn import(&self, rows: Vec<InventoryRow>) -> usize {
        let accepted = self.inventory.write().replace_all(rows);
        info!(accepted, "inventory replaced");
        accepted
    }

    pub fn initiate_shutdown(&self, key: &ServerKey) -> FleetResult<()> {
        let mut inventory = self.inventory.write();
        let record = inventory
            .find(&key.owner, &key.application, &key.server)
            .ok_or_else(|| FleetError::NotFound(key.clone()))?;

        if record.status.is_down() {
            return Err(FleetError::AlreadyShutDown(key.clone()));
        }

        if self.gate == GatePolicy::Enforced {
            let group = inventory
                .group(&key.owner, &key.application)
                .unwrap_or_default();
            let blocking = blocking_servers(group, record.shutdown_sequence);
            if !blocking.is_empty() {
                warn!(%key, ?blocking, "shutdown refused by wave gate");
                return Err(FleetError::SequenceBlocked {
                    key: key.clone(),
                    blocking,
                });
            }
        }

        if let Some(record) = inventory.find_mut(&key.owner, &key.application, &key.server) {
            record.status = ServerStatus::Shutdown;
        }
        info!(%key, "shutdown initiated");
        Ok(())
    }

    /// Probes one server and stores the observed status.
    pub async fn probe_and_update(&self, key: &ServerKey) -> FleetResult<ProbeOutcome> {
        let host = {
            let inventory = self.inventory.read();
            inventory
                .find(&key.owner, &key.application, &key.server)
                .map(|r| r.server.clone())
                .ok_or_else(|| FleetError::NotFound(key.clone()))?
        };

        let result = probe_isolated(self.probe.clone(), host, self.probe_timeout).await;
        self.apply_probe(key, result)
    }

    /// Probes every server concurrently. Individual failures never abort the
    /// batch; probes already dispatched update the store even if the caller
    /// stops waiting.
    pub async fn bulk_probe_and_update(&self) -> BulkProbeReport {
        let targets: Vec<ServerKey> = self
            .inventory
            .read()
            .all_records()
            .map(|(owner, application, record)| ServerKey::new(owner, application, record.server.clone()))
            .collect();
        info!(servers = targets.len(), "bulk probe started");

        let handles: Vec<_> = targets
            .into_iter()
            .map(|key| {
                let fleet = self.clone();
                tokio::spawn(async move { fleet.probe_and_update(&key).await })
            })
            .collect();

        let mut report = BulkProbeReport::default();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Ok(outcome)) => report.record(&outcome),
                Ok(Err(e)) => {
                    debug!(error = %e, "probe target vanished");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "probe task failed");
                    report.skipped += 1;
                }
            }
        }

        info!(
            probed = report.probed,
            online = report.online,
            offline = report.offline,
            failures = report.failures,
            "bulk probe finished"
        );
        report
    }

    pub fn delete(&self, key: &ServerKey) -> FleetResult<ServerRecord> {
        let removed = self
            .inventory
            .write()
            .remove(&key.owner, &key.application, &key.server)?;
        info!(%key, "record deleted");
        Ok(removed)
    }

    /// Edits a record, possibly relocating it. Status may be set freely.
    pub fn edit(
        &self,
        from: &ServerKey,
        new_owner: &str,
        new_application: &str,
        patch: &RecordPatch,
    ) -> FleetResult<ServerKey> {
        let to = self
            .inventory
            .write()
            .move_record(from, new_owner, new_application, patch)?;
        info!(%from, %to, "record updated");
        Ok(to)
    }

    fn apply_probe(&self, key: &ServerKey, result: Result<bool, ProbeError>) -> FleetResult<ProbeOutcome> {
        let (status, error) = match result {
            Ok(true) => (ServerStatus::Online, None),
            Ok(false) => (ServerStatus::Offline, None),
            Err(e) => {
                debug!(%key, error = %e, "probe failed, marking offline");
                (ServerStatus::Offline, Some(e.to_string()))
            }
        };

        let mut inventory = self.inventory.write();
        let record = inventory
            .find_mut(&key.owner, &key.application, &key.server)
            .ok_or_else(|| FleetError::NotFound(key.clone()))?;
        record.status = status.clone();

        Ok(ProbeOutcome {
            key: key.clone(),
            status,
            error,
        })
    }
}
