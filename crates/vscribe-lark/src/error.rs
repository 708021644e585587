//! Lark client error types.

use thiserror::Error;

/// Result type for Lark operations.
pub type LarkResult<T> = Result<T, LarkError>;

/// Errors from the Lark open platform.
#[derive(Debug, Error)]
pub enum LarkError {
    #[error("Failed to configure Lark client: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Lark API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("Missing data in Lark response")]
    MissingData,

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LarkError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }
}
