//! Destination sync engine.
//!
//! Pushes locally stored analysis records to remote destinations through
//! the [`destination::Destination`] trait. The engine owns all state
//! transitions; destinations only know how to create and update their own
//! remote entries.

pub mod destination;
pub mod destinations;
pub mod engine;
pub mod error;

pub use destination::{Destination, RemoteRef};
pub use destinations::{DocDestination, SheetDestination, TableDestination};
pub use engine::{PushOutcome, SyncEngine, SyncMode, SyncReport};
pub use error::{SyncError, SyncResult};
