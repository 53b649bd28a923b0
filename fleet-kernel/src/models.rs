use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a server.
///
/// Imported inventories may carry arbitrary status strings; anything that is
/// not one of the three known states is kept verbatim in `Other` so it can
/// still be displayed, while gating and KPIs match on the known variants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerStatus {
    #[default]
    Online,
    Offline,
    Shutdown,
    Other(String),
}

impl ServerStatus {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("online") {
            Self::Online
        } else if trimmed.eq_ignore_ascii_case("offline") {
            Self::Offline
        } else if trimmed.eq_ignore_ascii_case("shutdown") {
            Self::Shutdown
        } else {
            Self::Other(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Shutdown => "shutdown",
            Self::Other(text) => text,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// `offline` or `shutdown`: counted as "not online" by progress and KPIs.
    pub fn is_down(&self) -> bool {
        matches!(self, Self::Offline | Self::Shutdown)
    }
}

impl From<String> for ServerStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ServerStatus> for String {
    fn from(status: ServerStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last observed reachability, independent of `ServerStatus`.
///
/// `yes`/`no` are recognised case-insensitively; any other imported text is
/// kept as `Other` so it exports and filters unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pingable {
    #[default]
    Yes,
    No,
    Other(String),
}

impl Pingable {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("yes") {
            Self::Yes
        } else if trimmed.eq_ignore_ascii_case("no") {
            Self::No
        } else {
            Self::Other(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Other(text) => text,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<String> for Pingable {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Pingable> for String {
    fn from(pingable: Pingable) -> Self {
        pingable.as_str().to_string()
    }
}

/// Reads a number the lenient way: `"2.0"` and `" 1.5 "` parse, blanks and
/// non-finite values do not.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Coerces a raw wave number, truncating fractions; anything that is not a
/// non-negative number is 0.
pub fn parse_sequence(raw: &str) -> u32 {
    match parse_number(raw) {
        Some(n) if n >= 0.0 => n.trunc() as u32,
        _ => 0,
    }
}

/// One server of the fleet. Owner and application are the keys of the
/// inventory groups the record lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub server: String,
    pub status: ServerStatus,
    pub shutdown_sequence: u32,
    pub pingable: Pingable,
}

impl ServerRecord {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            status: ServerStatus::default(),
            shutdown_sequence: 0,
            pingable: Pingable::default(),
        }
    }

    pub fn with_status(mut self, status: ServerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.shutdown_sequence = sequence;
        self
    }

    pub fn with_pingable(mut self, pingable: Pingable) -> Self {
        self.pingable = pingable;
        self
    }
}

/// Identity of a record: (owner, application, server).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerKey {
    pub owner: String,
    pub application: String,
    pub server: String,
}

impl ServerKey {
    pub fn new(
        owner: impl Into<String>,
        application: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            application: application.into(),
            server: server.into(),
        }
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.application, self.server)
    }
}

/// Fields merged onto a record when it is edited; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub server: Option<String>,
    pub status: Option<ServerStatus>,
    pub shutdown_sequence: Option<u32>,
    pub pingable: Option<Pingable>,
}

impl RecordPatch {
    pub fn apply(&self, record: &mut ServerRecord) {
        if let Some(server) = &self.server {
            record.server = server.clone();
        }
        if let Some(status) = &self.status {
            record.status = status.clone();
        }
        if let Some(sequence) = self.shutdown_sequence {
            record.shutdown_sequence = sequence;
        }
        if let Some(pingable) = &self.pingable {
            record.pingable = pingable.clone();
        }
    }
}

/// A flat, unvalidated inventory row as produced by an importer.
/// Empty strings are treated the same as missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryRow {
    pub owner: Option<String>,
    pub application: Option<String>,
    pub server: Option<String>,
    pub status: Option<String>,
    pub shutdown_sequence: Option<String>,
    pub pingable: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_known_and_other() {
        assert_eq!(ServerStatus::parse("online"), ServerStatus::Online);
        assert_eq!(ServerStatus::parse(" Shutdown "), ServerStatus::Shutdown);
        assert_eq!(ServerStatus::parse("OFFLINE"), ServerStatus::Offline);
        assert_eq!(
            ServerStatus::parse("maintenance"),
            ServerStatus::Other("maintenance".into())
        );
        assert_eq!(ServerStatus::Other("Draining".into()).as_str(), "Draining");
    }

    #[test]
    fn test_status_serde_is_plain_string() {
        let json = serde_json::to_string(&ServerStatus::Shutdown).unwrap();
        assert_eq!(json, "\"shutdown\"");
        let other: ServerStatus = serde_json::from_str("\"patching\"").unwrap();
        assert_eq!(other, ServerStatus::Other("patching".into()));
    }

    #[test]
    fn test_parse_sequence_coerces_to_zero() {
        assert_eq!(parse_sequence("3"), 3);
        assert_eq!(parse_sequence(" 12 "), 12);
        assert_eq!(parse_sequence("abc"), 0);
        assert_eq!(parse_sequence("-2"), 0);
        assert_eq!(parse_sequence(""), 0);
        assert_eq!(parse_sequence("2.0"), 2);
        assert_eq!(parse_sequence("3.9"), 3);
        assert_eq!(parse_sequence("inf"), 0);
        assert_eq!(parse_sequence("NaN"), 0);
    }

    #[test]
    fn test_pingable_keeps_unknown_text() {
        assert_eq!(Pingable::parse(" YES "), Pingable::Yes);
        assert_eq!(Pingable::parse("No"), Pingable::No);
        assert_eq!(Pingable::parse("maybe"), Pingable::Other("maybe".into()));
        assert_eq!(Pingable::Other("maybe".into()).as_str(), "maybe");
        assert!(!Pingable::parse("maybe").is_yes());
    }

    #[test]
    fn test_patch_merges_only_given_fields() {
        let mut record = ServerRecord::new("web01").with_sequence(2);
        RecordPatch {
            status: Some(ServerStatus::Offline),
            ..Default::default()
        }
        .apply(&mut record);
        assert_eq!(record.server, "web01");
        assert_eq!(record.shutdown_sequence, 2);
        assert_eq!(record.status, ServerStatus::Offline);
    }
}
