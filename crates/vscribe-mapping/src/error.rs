//! Mapping error types.

use thiserror::Error;

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Errors from loading or applying a field mapping configuration.
///
/// The parser and adapter never fail; only the custom mapper is strict.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Mapping config not found: {0}")]
    ConfigNotFound(String),

    #[error("Mapping config is malformed: {0}")]
    ConfigMalformed(String),

    #[error("Mapping config defines no field mappings")]
    EmptyMappings,

    #[error("Mapping config is incomplete: {}", .0.join("; "))]
    Incomplete(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MappingError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound(path.into())
    }

    pub fn config_malformed(msg: impl Into<String>) -> Self {
        Self::ConfigMalformed(msg.into())
    }
}
