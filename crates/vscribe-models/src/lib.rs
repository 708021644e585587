//! Shared data models for the VScribe backend.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis records and their per-destination sync state
//! - Quick prompt templates
//! - The canonical field set produced by result adaptation
//! - Sequence-ID generation

pub mod fields;
pub mod media;
pub mod prompt;
pub mod record;
pub mod sequence;

// Re-export common types
pub use fields::{AdaptedFields, AdaptedOutput, CanonicalField, ValidationReport};
pub use media::guess_mime;
pub use prompt::QuickPrompt;
pub use record::{AnalysisRecord, NewAnalysis, SyncState};
pub use sequence::generate_sequence_id;
