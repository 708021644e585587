//! The destination seam.

use async_trait::async_trait;
use vscribe_models::AnalysisRecord;
use vscribe_store::SyncSlot;

use crate::error::SyncResult;

/// Reference to a record's remote counterpart, when the destination has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRef {
    /// Remote record ID (table destination)
    Record(String),
    /// Row number (spreadsheet destination)
    Row(i64),
    /// Append-only destinations track nothing
    None,
}

/// One push target. Implementations own their remote client and field
/// shaping; the engine owns state transitions and bookkeeping.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable name used in reports and CLI arguments.
    fn name(&self) -> &'static str;

    /// Which sync columns in the store this destination uses.
    fn slot(&self) -> SyncSlot;

    /// The record's existing remote reference, if it was pushed before.
    fn remote_ref(&self, record: &AnalysisRecord) -> RemoteRef;

    /// Create a remote entry for the record.
    async fn create(&self, record: &AnalysisRecord) -> SyncResult<RemoteRef>;

    /// Update the record's existing remote entry in place.
    async fn update(&self, record: &AnalysisRecord, remote: &RemoteRef) -> SyncResult<()>;
}
