//! Sync error types.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Destination error: {0}")]
    Destination(String),

    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    #[error("Record not found: {0}")]
    RecordNotFound(i64),

    #[error(transparent)]
    Store(#[from] vscribe_store::StoreError),

    #[error(transparent)]
    Lark(#[from] vscribe_lark::LarkError),

    #[error(transparent)]
    Mapping(#[from] vscribe_mapping::MappingError),
}

impl SyncError {
    pub fn destination(msg: impl Into<String>) -> Self {
        Self::Destination(msg.into())
    }
}
