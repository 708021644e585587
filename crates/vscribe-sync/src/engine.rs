//! Sync state machine.
//!
//! State transitions per record and destination:
//!
//! - `Synced` in the default `Pending` mode is skipped outright;
//!   `IncludeSynced` updates such records in place.
//! - A record with a remote reference is updated in place; when the update
//!   fails the stale reference is dropped and the record is re-created once.
//! - `Force` drops the reference first, so the push always re-creates.
//! - Any push failure marks the record `Failed`; failed records are picked
//!   up again by the next batch.
//!
//! Each destination has its own async lock, so overlapping sync commands
//! serialize per destination instead of interleaving writes.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};
use vscribe_models::{AnalysisRecord, SyncState};
use vscribe_store::{Database, SyncSlot};

use crate::destination::{Destination, RemoteRef};
use crate::error::{SyncError, SyncResult};

/// Pause between records in a batch, to stay under destination rate limits.
const BATCH_THROTTLE: Duration = Duration::from_millis(150);

/// How eagerly a batch or single push treats already-synced records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Only unsynced and failed records; synced records are skipped.
    #[default]
    Pending,
    /// Every record; synced records are updated in place.
    IncludeSynced,
    /// Every record; remote references are dropped and entries re-created.
    Force,
}

/// What happened to one record at one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Created,
    Updated,
    Skipped,
    Failed(String),
}

/// Batch summary for one destination.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncReport {
    pub destination: String,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncReport {
    fn new(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            total: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn record(&mut self, outcome: &PushOutcome) {
        self.total += 1;
        match outcome {
            PushOutcome::Created => self.created += 1,
            PushOutcome::Updated => self.updated += 1,
            PushOutcome::Skipped => self.skipped += 1,
            PushOutcome::Failed(_) => self.failed += 1,
        }
    }
}

struct Registered {
    dest: Box<dyn Destination>,
    lock: Mutex<()>,
}

/// Drives pushes from the local store to registered destinations.
pub struct SyncEngine {
    db: Database,
    destinations: Vec<Registered>,
    throttle: Duration,
}

impl SyncEngine {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            destinations: Vec::new(),
            throttle: BATCH_THROTTLE,
        }
    }

    #[cfg(test)]
    fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn register(&mut self, dest: Box<dyn Destination>) {
        self.destinations.push(Registered {
            dest,
            lock: Mutex::new(()),
        });
    }

    pub fn destination_names(&self) -> Vec<&'static str> {
        self.destinations.iter().map(|r| r.dest.name()).collect()
    }

    /// Push one record to every registered destination.
    pub async fn sync_record(
        &self,
        record_id: i64,
        mode: SyncMode,
    ) -> SyncResult<Vec<(String, PushOutcome)>> {
        let mut outcomes = Vec::new();
        for registered in &self.destinations {
            let record = self
                .db
                .get(record_id)?
                .ok_or(SyncError::RecordNotFound(record_id))?;
            let outcome = self.push_one(registered, &record, mode).await;
            outcomes.push((registered.dest.name().to_string(), outcome));
        }
        Ok(outcomes)
    }

    /// Push every pending record to one destination by name.
    pub async fn sync_destination(&self, name: &str, mode: SyncMode) -> SyncResult<SyncReport> {
        let registered = self
            .destinations
            .iter()
            .find(|r| r.dest.name() == name)
            .ok_or_else(|| SyncError::UnknownDestination(name.to_string()))?;
        self.run_batch(registered, mode).await
    }

    /// Push every pending record to every destination.
    pub async fn sync_all(&self, mode: SyncMode) -> SyncResult<Vec<SyncReport>> {
        let mut reports = Vec::new();
        for registered in &self.destinations {
            reports.push(self.run_batch(registered, mode).await?);
        }
        Ok(reports)
    }

    async fn run_batch(&self, registered: &Registered, mode: SyncMode) -> SyncResult<SyncReport> {
        let slot = registered.dest.slot();
        let pending = match mode {
            SyncMode::Pending => self.db.unsynced(slot)?,
            SyncMode::IncludeSynced | SyncMode::Force => self.db.list_all()?,
        };

        let mut report = SyncReport::new(registered.dest.name());
        let mut first = true;
        for record in pending {
            if !first {
                tokio::time::sleep(self.throttle).await;
            }
            first = false;

            // Refetch in case an earlier destination's push touched it.
            let Some(record) = self.db.get(record.id)? else {
                continue;
            };
            let outcome = self.push_one(registered, &record, mode).await;
            report.record(&outcome);
        }

        info!(
            destination = report.destination,
            total = report.total,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "sync batch finished"
        );
        Ok(report)
    }

    async fn push_one(
        &self,
        registered: &Registered,
        record: &AnalysisRecord,
        mode: SyncMode,
    ) -> PushOutcome {
        let _guard = registered.lock.lock().await;

        match self.try_push(registered, record, mode).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    destination = registered.dest.name(),
                    record_id = record.id,
                    "push failed: {}",
                    e
                );
                let slot = registered.dest.slot();
                if let Err(store_err) = self.db.set_sync_state(record.id, slot, SyncState::Failed) {
                    warn!(record_id = record.id, "failed to mark record: {}", store_err);
                }
                PushOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_push(
        &self,
        registered: &Registered,
        record: &AnalysisRecord,
        mode: SyncMode,
    ) -> SyncResult<PushOutcome> {
        let dest = registered.dest.as_ref();
        let slot = dest.slot();

        if mode == SyncMode::Pending && slot_state(record, slot) == SyncState::Synced {
            return Ok(PushOutcome::Skipped);
        }

        let mut remote = dest.remote_ref(record);
        if mode == SyncMode::Force && remote != RemoteRef::None {
            self.clear_ref(record.id, slot)?;
            remote = RemoteRef::None;
        }

        let outcome = match &remote {
            RemoteRef::None => {
                let created = dest.create(record).await?;
                self.store_ref(record.id, slot, &created)?;
                PushOutcome::Created
            }
            existing => match dest.update(record, existing).await {
                Ok(()) => PushOutcome::Updated,
                Err(e) => {
                    // The remote side may have deleted the entry; drop the
                    // stale reference and re-create once.
                    warn!(
                        destination = dest.name(),
                        record_id = record.id,
                        "update failed, re-creating: {}",
                        e
                    );
                    self.clear_ref(record.id, slot)?;
                    let created = dest.create(record).await?;
                    self.store_ref(record.id, slot, &created)?;
                    PushOutcome::Created
                }
            },
        };

        self.db.set_sync_state(record.id, slot, SyncState::Synced)?;
        Ok(outcome)
    }

    fn clear_ref(&self, record_id: i64, slot: SyncSlot) -> SyncResult<()> {
        match slot {
            SyncSlot::Table => self.db.set_table_record_id(record_id, None)?,
            SyncSlot::Sheet => self.db.set_sheet_row(record_id, None)?,
            SyncSlot::Doc => {}
        }
        Ok(())
    }

    fn store_ref(&self, record_id: i64, slot: SyncSlot, remote: &RemoteRef) -> SyncResult<()> {
        match (slot, remote) {
            (SyncSlot::Table, RemoteRef::Record(id)) => {
                self.db.set_table_record_id(record_id, Some(id))?
            }
            (SyncSlot::Sheet, RemoteRef::Row(row)) => self.db.set_sheet_row(record_id, Some(*row))?,
            _ => {}
        }
        Ok(())
    }
}

fn slot_state(record: &AnalysisRecord, slot: SyncSlot) -> SyncState {
    match slot {
        SyncSlot::Table => record.table_sync_status,
        SyncSlot::Sheet => record.sheet_sync_status,
        SyncSlot::Doc => record.doc_sync_status,
    }
}
