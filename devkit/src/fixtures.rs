/*!
Fixture builders: inventories, CSV payloads and multipart upload bodies.
*/

use fleet_kernel::{Inventory, InventoryRow, Pingable, ServerStatus};

/// Builds an inventory the same way an import would (duplicates skipped).
#[derive(Debug, Default)]
pub struct FleetBuilder {
    rows: Vec<InventoryRow>,
}

impl FleetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Online, pingable server.
    pub fn server(self, owner: &str, application: &str, server: &str, sequence: u32) -> Self {
        self.record(owner, application, server, sequence, ServerStatus::Online, Pingable::Yes)
    }

    pub fn with_status(
        self,
        owner: &str,
        application: &str,
        server: &str,
        sequence: u32,
        status: ServerStatus,
    ) -> Self {
        self.record(owner, application, server, sequence, status, Pingable::Yes)
    }

    pub fn record(
        mut self,
        owner: &str,
        application: &str,
        server: &str,
        sequence: u32,
        status: ServerStatus,
        pingable: Pingable,
    ) -> Self {
        self.rows.push(InventoryRow {
            owner: Some(owner.into()),
            application: Some(application.into()),
            server: Some(server.into()),
            status: Some(status.as_str().into()),
            shutdown_sequence: Some(sequence.to_string()),
            pingable: Some(pingable.as_str().into()),
        });
        self
    }

    pub fn rows(&self) -> &[InventoryRow] {
        &self.rows
    }

    pub fn build(self) -> Inventory {
        let mut inventory = Inventory::new();
        inventory.init(self.rows);
        inventory
    }
}

/// CSV payloads for uploads, written with `csv::Writer` so cells holding
/// commas or quotes are escaped. Rows may be ragged.
#[derive(Debug, Clone)]
pub struct CsvBuilder {
    records: Vec<Vec<String>>,
}

impl CsvBuilder {
    pub fn new(headers: &[&str]) -> Self {
        Self { records: vec![to_cells(headers)] }
    }

    /// Header row with the default column names.
    pub fn standard() -> Self {
        Self::new(&["owner", "application", "server", "status", "shutdown_sequence", "pingable"])
    }

    pub fn row(mut self, cells: &[&str]) -> Self {
        self.records.push(to_cells(cells));
        self
    }

    pub fn build(&self) -> String {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        for record in &self.records {
            writer.write_record(record).expect("write csv row to memory");
        }
        let bytes = writer.into_inner().expect("flush csv buffer");
        String::from_utf8(bytes).expect("csv fixture is utf-8")
    }
}

fn to_cells(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub const MULTIPART_BOUNDARY: &str = "fleet-devkit-boundary";

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}")
}

/// Encodes text fields plus an optional `csv_file` part.
pub fn multipart_body(fields: &[(&str, &str)], csv_file: Option<&str>) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some(csv) = csv_file {
        body.push_str(&format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"csv_file\"; filename=\"inventory.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n"
        ));
    }
    body.push_str(&format!("--{MULTIPART_BOUNDARY}--\r\n"));
    body.into_bytes()
}
