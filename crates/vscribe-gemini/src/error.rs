//! Inference client error types.

use thiserror::Error;

/// Result type for inference operations.
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Errors that can occur while talking to the inference service.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Failed to configure inference client: {0}")]
    ConfigError(String),

    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File processing failed: {0}")]
    ProcessingFailed(String),

    #[error("File processing timed out after {0}s")]
    ProcessingTimeout(u64),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeminiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Whether the error looks like transient overload.
    ///
    /// Only capacity problems are worth retrying; schema and auth errors
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            GeminiError::ApiError { status, message } => {
                let message = message.to_lowercase();
                *status == 503
                    || *status == 429
                    || message.contains("overloaded")
                    || message.contains("unavailable")
                    || message.contains("rate limit")
            }
            GeminiError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overload_errors_are_retryable() {
        let e = GeminiError::ApiError {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert!(e.is_retryable());

        let e = GeminiError::ApiError {
            status: 500,
            message: "The model is overloaded".into(),
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let e = GeminiError::ApiError {
            status: 400,
            message: "Invalid argument".into(),
        };
        assert!(!e.is_retryable());
        assert!(!GeminiError::EmptyResponse.is_retryable());
    }
}
