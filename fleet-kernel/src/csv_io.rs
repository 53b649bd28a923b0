/**
 * CSV IMPORT / EXPORT - Flat rows in and out of the inventory
 *
 * ROLE:
 * Turns an uploaded CSV (with per-upload column mapping) into
 * `InventoryRow`s for `Inventory::replace_all`, and writes the inventory
 * back out with the default column names so an export re-imports as-is.
 *
 * The whole file is parsed before anything is replaced: a malformed CSV
 * leaves the inventory untouched.
 */

use crate::inventory::Inventory;
use crate::models::InventoryRow;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("No file uploaded.")]
    MissingFile,
    #[error("Error parsing CSV.")]
    Parse(#[from] csv::Error),
    #[error("Invalid upload: {0}")]
    Upload(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Column names to read each field from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub owner: String,
    pub application: String,
    pub server: String,
    pub status: String,
    pub shutdown_sequence: String,
    pub pingable: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            owner: "owner".into(),
            application: "application".into(),
            server: "server".into(),
            status: "status".into(),
            shutdown_sequence: "shutdown_sequence".into(),
            pingable: "pingable".into(),
        }
    }
}

impl ColumnMapping {
    /// Applies a `map_<field>` form value. Empty values keep the default.
    /// Returns false for unknown form fields.
    pub fn set(&mut self, form_field: &str, column: &str) -> bool {
        let slot = match form_field {
            "map_owner" => &mut self.owner,
            "map_application" => &mut self.application,
            "map_server" => &mut self.server,
            "map_status" => &mut self.status,
            "map_shutdown_sequence" => &mut self.shutdown_sequence,
            "map_pingable" => &mut self.pingable,
            _ => return false,
        };
        let column = column.trim();
        if !column.is_empty() {
            *slot = column.to_string();
        }
        true
    }

    fn headers(&self) -> [&str; 6] {
        [
            &self.owner,
            &self.application,
            &self.server,
            &self.status,
            &self.shutdown_sequence,
            &self.pingable,
        ]
    }
}

pub fn parse_csv(data: &[u8], mapping: &ColumnMapping) -> Result<Vec<InventoryRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let index = |column: &str| headers.iter().position(|h| h == column);
    let [owner, application, server, status, sequence, pingable] = mapping.headers().map(index);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        rows.push(InventoryRow {
            owner: cell(owner),
            application: cell(application),
            server: cell(server),
            status: cell(status),
            shutdown_sequence: cell(sequence),
            pingable: cell(pingable),
        });
    }
    Ok(rows)
}

pub fn export_csv(inventory: &Inventory) -> Result<String, ImportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ColumnMapping::default().headers())?;
    for (owner, application, record) in inventory.all_records() {
        writer.write_record([
            owner,
            application,
            record.server.as_str(),
            record.status.as_str(),
            record.shutdown_sequence.to_string().as_str(),
            record.pingable.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pingable, ServerStatus};

    #[test]
    fn test_parse_with_default_mapping() {
        let csv = "owner,application,server,status,shutdown_sequence,pingable\n\
                   Team, Billing ,db01,offline,2,no\n\
                   Team,Billing,,online,1,yes\n";
        let rows = parse_csv(csv.as_bytes(), &ColumnMapping::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].application.as_deref(), Some("Billing"));
        assert_eq!(rows[0].shutdown_sequence.as_deref(), Some("2"));
        assert_eq!(rows[1].server, None);

        let mut inv = Inventory::new();
        assert_eq!(inv.replace_all(rows), 1);
        let rec = inv.find("Team", "Billing", "db01").unwrap();
        assert_eq!(rec.status, ServerStatus::Offline);
        assert_eq!(rec.pingable, Pingable::No);
    }

    #[test]
    fn test_parse_with_custom_mapping_and_missing_columns() {
        let csv = "Host,Team\nweb01,Ops\n";
        let mut mapping = ColumnMapping::default();
        assert!(mapping.set("map_server", "Host"));
        assert!(mapping.set("map_owner", "Team"));
        assert!(mapping.set("map_status", ""));
        assert!(!mapping.set("csv_file", "x"));
        assert_eq!(mapping.status, "status");

        let rows = parse_csv(csv.as_bytes(), &mapping).unwrap();
        assert_eq!(rows[0].server.as_deref(), Some("web01"));
        assert_eq!(rows[0].owner.as_deref(), Some("Ops"));
        assert_eq!(rows[0].application, None);
    }

    #[test]
    fn test_ragged_csv_is_an_error() {
        let csv = "owner,application,server\nA,B,c,extra\n";
        let err = parse_csv(csv.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
        assert_eq!(err.to_string(), "Error parsing CSV.");
    }

    #[test]
    fn test_export_reimports_identically() {
        let mut inv = Inventory::new();
        inv.insert("O", "A", crate::models::ServerRecord::new("s1").with_sequence(3)).unwrap();
        inv.insert(
            "O",
            "B",
            crate::models::ServerRecord::new("s2")
                .with_status(ServerStatus::Other("Patching".into()))
                .with_pingable(Pingable::Other("maybe".into())),
        )
        .unwrap();

        let exported = export_csv(&inv).unwrap();
        assert!(exported.starts_with("owner,application,server,status,shutdown_sequence,pingable\n"));
        assert!(exported.contains("O,B,s2,Patching,0,maybe\n"));

        let mut reimported = Inventory::new();
        reimported.replace_all(parse_csv(exported.as_bytes(), &ColumnMapping::default()).unwrap());
        assert_eq!(reimported, inv);
    }
}
