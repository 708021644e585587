//! Gemini inference client.
//!
//! Uploads videos to the file API, waits for server-side processing, and
//! runs analysis prompts against the processed file. Transient overload is
//! retried with exponential backoff.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{FileState, GeminiClient, GeminiConfig, RemoteFile};
pub use error::{GeminiError, GeminiResult};
pub use retry::{with_retry, RetryConfig};
