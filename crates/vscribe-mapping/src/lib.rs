//! Result parsing and field mapping.
//!
//! This crate is the narrow seam between free-form inference output and the
//! rest of the system:
//!
//! 1. [`parser::parse`] turns raw text into a key/value map, best effort.
//! 2. [`adapter::adapt`] normalizes that map against the fixed canonical
//!    field set.
//! 3. [`mapper::CustomFieldMapper`] applies a user-editable mapping config to
//!    produce destination-shaped records.
//!
//! Callers never depend on the heuristics directly, so the upstream prompt
//! can be tightened to strict JSON without touching anything downstream.

pub mod adapter;
pub mod config;
pub mod error;
pub mod mapper;
pub mod parser;

pub use adapter::adapt;
pub use config::{FieldMappingConfig, TransformRule};
pub use error::{MappingError, MappingResult};
pub use mapper::CustomFieldMapper;
pub use parser::parse;
