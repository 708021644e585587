//! S3-compatible object storage.
//!
//! Mirrors analyzed videos to a bucket so destination tables can link to a
//! durable URL. Large files go through multipart upload; every object
//! carries a SHA-256 content checksum as metadata.

pub mod client;
pub mod error;
pub mod keys;

pub use client::{ObjectInfo, StorageClient, StorageConfig, UploadOutcome};
pub use error::{StorageError, StorageResult};
pub use keys::{generate_key, ObjectAcl};
