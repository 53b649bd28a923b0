/*!
Scripted liveness probe for tests without a network

Each host answers with a configured `StubOutcome` (default: alive).
Every call is recorded so tests can assert what was probed.
*/

use fleet_kernel::probe::{LivenessProbe, ProbeError};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubOutcome {
    Alive,
    Dead,
    Fail(String),
    Panic,
    /// Never answers; only a timeout ends it.
    Hang,
    /// Alive after the given delay.
    Slow(Duration),
}

#[derive(Clone)]
pub struct StubProbe {
    outcomes: Arc<Mutex<HashMap<String, StubOutcome>>>,
    fallback: Arc<Mutex<StubOutcome>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubProbe {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            fallback: Arc::new(Mutex::new(StubOutcome::Alive)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Outcome for hosts without an explicit entry.
    pub fn with_default(self, outcome: StubOutcome) -> Self {
        *self.fallback.lock() = outcome;
        self
    }

    pub fn set(&self, host: impl Into<String>, outcome: StubOutcome) -> &Self {
        self.outcomes.lock().insert(host.into(), outcome);
        self
    }

    pub fn outcome_for(&self, host: &str) -> StubOutcome {
        self.outcomes
            .lock()
            .get(host)
            .cloned()
            .unwrap_or_else(|| self.fallback.lock().clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, host: &str) -> usize {
        self.calls.lock().iter().filter(|h| *h == host).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl Default for StubProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessProbe for StubProbe {
    fn probe<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<bool, ProbeError>> {
        Box::pin(async move {
            self.calls.lock().push(host.to_string());
            tracing::debug!(host, "stub probe called");
            match self.outcome_for(host) {
                StubOutcome::Alive => Ok(true),
                StubOutcome::Dead => Ok(false),
                StubOutcome::Fail(reason) => Err(ProbeError::Command(reason)),
                StubOutcome::Panic => panic!("stub probe panicked for {host}"),
                StubOutcome::Hang => futures::future::pending().await,
                StubOutcome::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(true)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outcomes_and_call_log() {
        let probe = StubProbe::new().with_default(StubOutcome::Dead);
        probe.set("up", StubOutcome::Alive).set("broken", StubOutcome::Fail("no route".into()));

        assert!(probe.probe("up").await.unwrap());
        assert!(!probe.probe("other").await.unwrap());
        assert!(probe.probe("broken").await.is_err());
        assert!(probe.probe("up").await.unwrap());

        assert_eq!(probe.call_count("up"), 2);
        assert_eq!(probe.calls(), vec!["up", "other", "broken", "up"]);
        probe.clear_calls();
        assert!(probe.calls().is_empty());
    }
}
