//! Local SQLite datastore.
//!
//! Holds every analysis result plus per-destination sync bookkeeping, and
//! the user's quick prompt templates.

pub mod db;
pub mod error;
pub mod schema;

pub use db::{Database, Statistics, SyncSlot};
pub use error::{StoreError, StoreResult};
