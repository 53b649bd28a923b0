/*!
Test harness for the fleet service

Bundles an inventory, a `Fleet` wired to a `StubProbe`, and assertion
helpers that read the shared store the same way the HTTP layer does.
*/

use crate::probe_stub::StubProbe;
use anyhow::Result;
use fleet_kernel::auth::Auth;
use fleet_kernel::health::HealthTracker;
use fleet_kernel::http::{build_router, AppState};
use fleet_kernel::sequence::plan_waves;
use fleet_kernel::state::new_state;
use fleet_kernel::{Fleet, GatePolicy, Inventory, ServerKey, ServerStatus};
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub fleet: Fleet,
    pub probe: StubProbe,
    pub health: HealthTracker,
}

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
}

impl TestHarness {
    pub fn new(inventory: Inventory) -> Self {
        init_tracing();
        let probe = StubProbe::new();
        Self {
            fleet: Fleet::new(new_state(inventory), Arc::new(probe.clone())),
            probe,
            health: HealthTracker::new(),
        }
    }

    pub fn with_gate(mut self, gate: GatePolicy) -> Self {
        self.fleet = self.fleet.with_gate_policy(gate);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.fleet = self.fleet.with_probe_timeout(timeout);
        self
    }

    pub fn status_of(&self, owner: &str, application: &str, server: &str) -> Option<ServerStatus> {
        self.fleet
            .inventory()
            .read()
            .find(owner, application, server)
            .map(|r| r.status.clone())
    }

    /// Gate flag of a server computed over its full (unfiltered) group.
    pub fn allowed(&self, owner: &str, application: &str, server: &str) -> Option<bool> {
        let inventory = self.fleet.inventory().read();
        let group = inventory.group(owner, application)?;
        plan_waves(group)
            .into_iter()
            .flat_map(|bucket| bucket.records)
            .find(|gated| gated.record.server == server)
            .map(|gated| gated.shutdown_allowed)
    }

    pub fn assert_status(&self, key: &ServerKey, expected: ServerStatus) -> Result<()> {
        match self.status_of(&key.owner, &key.application, &key.server) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!("{key}: expected status {expected}, got {actual}"),
            None => anyhow::bail!("{key}: record not found"),
        }
    }

    pub fn assert_missing(&self, key: &ServerKey) -> Result<()> {
        if let Some(status) = self.status_of(&key.owner, &key.application, &key.server) {
            anyhow::bail!("{key}: expected no record, found one with status {status}");
        }
        Ok(())
    }

    pub fn app_state(&self, auth: Auth) -> AppState {
        AppState {
            fleet: self.fleet.clone(),
            auth,
            health: self.health.clone(),
        }
    }

    /// Router guarded by an API key (`x-api-key: <api_key>`).
    pub fn router(&self, api_key: &str) -> axum::Router {
        self.router_with(Auth::new(Some(api_key.into()), None, time::Duration::minutes(30)))
    }

    pub fn router_with(&self, auth: Auth) -> axum::Router {
        build_router(self.app_state(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FleetBuilder;
    use crate::probe_stub::StubOutcome;

    #[tokio::test]
    async fn test_harness_probe_and_assertions() {
        let harness = TestHarness::new(
            FleetBuilder::new()
                .with_status("O", "A", "db", 0, ServerStatus::Offline)
                .server("O", "A", "web", 1)
                .build(),
        );
        harness.probe.set("web", StubOutcome::Dead);

        let web = ServerKey::new("O", "A", "web");
        harness.assert_status(&web, ServerStatus::Online).unwrap();
        assert_eq!(harness.allowed("O", "A", "web"), Some(false));

        harness.fleet.probe_and_update(&web).await.unwrap();
        harness.assert_status(&web, ServerStatus::Offline).unwrap();
        assert!(harness.assert_status(&web, ServerStatus::Online).is_err());
        assert_eq!(harness.probe.calls(), vec!["web"]);

        harness.fleet.delete(&web).unwrap();
        harness.assert_missing(&web).unwrap();
        assert_eq!(harness.allowed("O", "A", "web"), None);
    }
}
