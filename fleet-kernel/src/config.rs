use crate::lifecycle::{GatePolicy, DEFAULT_PROBE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

pub const CONFIG_ENV: &str = "FLEET_KERNEL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "kernel.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: SocketAddr,
    pub probe: ProbeConf,
    pub sequence_gate: GatePolicy,
    pub demo: DemoConf,
    pub auth: AuthConf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConf {
    pub command: String, // ex: "ping -c 1 -W 1 {host}"
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConf {
    pub servers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConf {
    pub session_ttl_minutes: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            probe: ProbeConf::default(),
            sequence_gate: GatePolicy::default(),
            demo: DemoConf::default(),
            auth: AuthConf::default(),
        }
    }
}

impl Default for ProbeConf {
    fn default() -> Self {
        let command = if cfg!(windows) {
            "ping -n 1 -w 1000 {host}"
        } else {
            "ping -c 1 -W 1 {host}"
        };
        Self {
            command: command.into(),
            timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for DemoConf {
    fn default() -> Self {
        Self { servers: 200 }
    }
}

impl Default for AuthConf {
    fn default() -> Self {
        Self { session_ttl_minutes: 480 }
    }
}

impl ProbeConf {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AuthConf {
    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::minutes(self.session_ttl_minutes as i64)
    }
}

/// Parses a config document. Blank input yields the defaults.
pub fn parse_config(text: &str) -> Result<KernelConfig, ConfigError> {
    if text.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_config_from(&path).await
}

/// Never fails: a missing or invalid file falls back to the defaults.
pub async fn load_config_from(path: impl AsRef<Path>) -> KernelConfig {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "no config file, using defaults");
        return KernelConfig::default();
    }

    let loaded = match fs::read_to_string(path).await {
        Ok(text) => parse_config(&text),
        Err(e) => Err(e.into()),
    };
    loaded.unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "invalid config, using defaults");
        KernelConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let cfg = parse_config("sequence_gate: enforced\nprobe:\n  timeout_ms: 500\n").unwrap();
        assert_eq!(cfg.sequence_gate, GatePolicy::Enforced);
        assert_eq!(cfg.probe.timeout(), Duration::from_millis(500));
        assert_eq!(cfg.probe.command, ProbeConf::default().command);
        assert_eq!(cfg.demo.servers, 200);
        assert_eq!(cfg.listen.port(), 3000);
    }

    #[test]
    fn test_blank_and_bad_documents() {
        assert_eq!(parse_config("  \n").unwrap(), KernelConfig::default());
        assert!(matches!(parse_config("sequence_gate: sometimes"), Err(ConfigError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen: 127.0.0.1:8088\ndemo:\n  servers: 0").unwrap();

        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.listen, "127.0.0.1:8088".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.demo.servers, 0);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(dir.path().join("absent.yaml")).await;
        assert_eq!(cfg, KernelConfig::default());

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "listen: [not, an, address]").unwrap();
        assert_eq!(load_config_from(&bad).await, KernelConfig::default());
    }
}
