/**
 * LIVENESS PROBE - Reachability check for a single host
 *
 * ROLE:
 * Abstracts "is this host alive?" behind `LivenessProbe`. The default
 * implementation runs a configurable command (ping by default) and treats
 * a successful exit status as alive.
 *
 * ISOLATION:
 * `probe_isolated` runs each probe in its own task under a timeout, so a
 * hanging or panicking probe only affects its own host.
 */

use futures::future::BoxFuture;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

pub const HOST_PLACEHOLDER: &str = "{host}";

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid probe command: {0}")]
    Command(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("probe task failed: {0}")]
    Panicked(String),
}

pub trait LivenessProbe: Send + Sync {
    fn probe<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<bool, ProbeError>>;
}

/// Runs an external command per host, e.g. `ping -c 1 -W 1 {host}`.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn from_template(template: &str) -> Result<Self, ProbeError> {
        let mut words = shell_words::split(template).map_err(|e| ProbeError::Command(e.to_string()))?;
        if words.is_empty() {
            return Err(ProbeError::Command("empty command".into()));
        }
        let program = words.remove(0);
        Ok(Self { program, args: words })
    }

    pub fn args_for(&self, host: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(HOST_PLACEHOLDER, host))
            .collect()
    }
}

impl LivenessProbe for CommandProbe {
    fn probe<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<bool, ProbeError>> {
        Box::pin(async move {
            let status = Command::new(&self.program)
                .args(self.args_for(host))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status()
                .await?;
            Ok(status.success())
        })
    }
}

/// Probes `host` in a dedicated task bounded by `timeout`.
pub async fn probe_isolated(
    probe: Arc<dyn LivenessProbe>,
    host: String,
    timeout: Duration,
) -> Result<bool, ProbeError> {
    let mut task = tokio::spawn(async move { probe.probe(&host).await });
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ProbeError::Panicked(join_error.to_string())),
        Err(_) => {
            task.abort();
            Err(ProbeError::Timeout(timeout))
        }
    }
}
