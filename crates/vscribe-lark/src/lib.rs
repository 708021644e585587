//! Lark open platform client.
//!
//! Covers the three surfaces sync pushes to: bitable records, spreadsheet
//! rows, and document blocks. Tenant access tokens are cached with a
//! refresh margin so long sync batches never race token expiry.

pub mod bitable;
pub mod client;
pub mod docx;
pub mod error;
pub mod sheets;
pub mod token;

pub use bitable::FIELD_TYPE_TEXT;
pub use client::{LarkClient, LarkConfig};
pub use error::{LarkError, LarkResult};
pub use token::TokenCache;
