use crate::models::ServerKey;

/// Outcome of a failed inventory or lifecycle operation.
///
/// None of these are fatal: the store is left as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Record not found: {0}")]
    NotFound(ServerKey),
    #[error("Server '{}' not found or already shut down.", .0.server)]
    AlreadyShutDown(ServerKey),
    #[error("Server '{}' already exists in {}/{}", .0.server, .0.owner, .0.application)]
    DuplicateServer(ServerKey),
    #[error("Shutdown of '{}' blocked by lower waves: [{}]", .key.server, .blocking.join(", "))]
    SequenceBlocked { key: ServerKey, blocking: Vec<String> },
    #[error(transparent)]
    Import(#[from] crate::csv_io::ImportError),
}

pub type FleetResult<T> = Result<T, FleetError>;
