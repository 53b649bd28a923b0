//! Fleet shutdown tracker: inventory, filtering, wave gating, lifecycle
//! transitions and the HTTP surface serving the dashboard.

pub mod auth;
pub mod config;
pub mod csv_io;
pub mod demo;
pub mod error;
pub mod filter;
pub mod health;
pub mod http;
pub mod inventory;
pub mod kpi;
pub mod lifecycle;
pub mod models;
pub mod probe;
pub mod sequence;
pub mod state;
pub mod view;

pub use error::{FleetError, FleetResult};
pub use inventory::Inventory;
pub use lifecycle::{BulkProbeReport, Fleet, GatePolicy};
pub use models::{InventoryRow, Pingable, RecordPatch, ServerKey, ServerRecord, ServerStatus};
