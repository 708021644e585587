//! Gemini file upload and video analysis.
//!
//! Flow: upload the video through the file API, poll until the service has
//! finished processing it, then reference the processed file in a
//! generateContent call together with the analysis prompt.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GeminiError, GeminiResult};
use crate::retry::{with_retry, RetryConfig};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// How often the file state is polled while processing.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Processing wait ceiling.
const POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| GeminiError::config_error("GEMINI_API_KEY not set"))?,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
}

/// A file registered with the inference service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Service-assigned name ("files/...")
    pub name: String,
    pub uri: String,
    pub state: FileState,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    FileData { file_uri: String, mime_type: String },
    Text(String),
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Gemini inference client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    retry: RetryConfig,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            retry: RetryConfig::default(),
            poll_interval: POLL_INTERVAL,
            poll_timeout: POLL_TIMEOUT,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        Ok(Self::new(GeminiConfig::from_env()?))
    }

    #[cfg(test)]
    fn with_poll_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Upload a video file to the file API.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        mime_type: &str,
    ) -> GeminiResult<RemoteFile> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        debug!("uploading {} ({} bytes)", path.display(), bytes.len());

        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.config.base_url, self.config.api_key
        );
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await?;
        let upload: UploadResponse = Self::decode(response).await?;

        info!(name = %upload.file.name, "uploaded {}", path.display());
        Ok(upload.file)
    }

    /// Poll until the uploaded file is ready for inference.
    ///
    /// `Failed` is fatal; processing past the ceiling is a timeout error.
    pub async fn wait_until_active(&self, file: &RemoteFile) -> GeminiResult<RemoteFile> {
        let deadline = Instant::now() + self.poll_timeout;
        let mut current = file.clone();

        loop {
            match current.state {
                FileState::Active => return Ok(current),
                FileState::Failed => {
                    return Err(GeminiError::ProcessingFailed(current.name.clone()))
                }
                FileState::Processing => {
                    if Instant::now() >= deadline {
                        return Err(GeminiError::ProcessingTimeout(
                            self.poll_timeout.as_secs(),
                        ));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                    current = self.get_file(&current.name).await?;
                }
            }
        }
    }

    /// Fetch the current state of an uploaded file.
    pub async fn get_file(&self, name: &str) -> GeminiResult<RemoteFile> {
        let url = format!(
            "{}/v1beta/{}?key={}",
            self.config.base_url, name, self.config.api_key
        );
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    /// Run the analysis prompt against an active file, with overload retry.
    pub async fn generate(&self, file: &RemoteFile, prompt: &str) -> GeminiResult<String> {
        let mime_type = file
            .mime_type
            .clone()
            .unwrap_or_else(|| "video/mp4".to_string());
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::FileData {
                        file_uri: file.uri.clone(),
                        mime_type,
                    },
                    Part::Text(prompt.to_string()),
                ],
            }],
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );

        with_retry(&self.retry, "generate_content", || {
            let request = &request;
            let url = &url;
            async move {
                let response = self.client.post(url).json(request).send().await?;
                let body: GenerateResponse = Self::decode(response).await?;

                let text: String = body
                    .candidates
                    .first()
                    .map(|c| {
                        c.content
                            .parts
                            .iter()
                            .map(|p| p.text.as_str())
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();

                if text.trim().is_empty() {
                    return Err(GeminiError::EmptyResponse);
                }
                Ok(text)
            }
        })
        .await
    }

    /// Upload a video, wait for processing, and run the analysis prompt.
    ///
    /// Returns the raw model output together with the remote file handle so
    /// the caller can persist the file reference.
    pub async fn analyze_video(
        &self,
        path: impl AsRef<Path>,
        mime_type: &str,
        prompt: &str,
    ) -> GeminiResult<(String, RemoteFile)> {
        let uploaded = self.upload_file(path, mime_type).await?;
        let active = self.wait_until_active(&uploaded).await?;
        let text = self.generate(&active, prompt).await?;
        Ok((text, active))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> GeminiResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(GeminiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}
