//! S3-compatible storage client.

use std::path::{Path, PathBuf};

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use base64::Engine;
use chrono::Local;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{StorageError, StorageResult};
use crate::keys::{generate_key, ObjectAcl};

/// Files at or above this size go through multipart upload.
const MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;
/// Part size for multipart uploads.
const PART_SIZE: usize = 10 * 1024 * 1024;

/// Configuration for the storage client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" works for most S3-compatible providers)
    pub region: String,
    /// Optional public base URL for serving uploaded objects
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("S3_PUBLIC_BASE_URL").ok(),
        })
    }
}

/// One stored object, as returned by listing.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified_ms: Option<u64>,
}

/// Result of one file upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub key: String,
    pub url: String,
    pub size: u64,
    /// Base64-encoded SHA-256 of the file contents
    pub checksum: String,
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    endpoint_url: String,
    public_base_url: Option<String>,
}

impl StorageClient {
    /// Create a new client from configuration.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vscribe",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            endpoint_url: config.endpoint_url,
            public_base_url: config.public_base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(StorageConfig::from_env()?)
    }

    /// Upload one video file, picking single-shot or multipart by size.
    ///
    /// The object key is date-partitioned and timestamped, so uploads never
    /// collide. The SHA-256 checksum travels as object metadata.
    pub async fn upload_video(
        &self,
        path: impl AsRef<Path>,
        acl: ObjectAcl,
    ) -> StorageResult<UploadOutcome> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let size = metadata.len();

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
        let key = generate_key(file_name, Local::now());
        let content_type =
            vscribe_models::guess_mime(path).unwrap_or("application/octet-stream");
        let checksum = sha256_base64(path).await?;

        if size >= MULTIPART_THRESHOLD {
            self.upload_multipart(path, &key, content_type, &checksum, acl)
                .await?;
        } else {
            self.upload_single(path, &key, content_type, &checksum, acl)
                .await?;
        }

        let url = self.public_url(&key)?;
        info!(key = %key, size, "uploaded {}", path.display());
        Ok(UploadOutcome {
            key,
            url,
            size,
            checksum,
        })
    }

    /// Upload several files, continuing past individual failures.
    pub async fn upload_files(
        &self,
        paths: &[PathBuf],
        acl: ObjectAcl,
    ) -> Vec<(PathBuf, StorageResult<UploadOutcome>)> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let result = self.upload_video(path, acl).await;
            if let Err(ref e) = result {
                warn!(path = %path.display(), "upload failed: {}", e);
            }
            results.push((path.clone(), result));
        }
        results
    }

    async fn upload_single(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
        checksum: &str,
        acl: ObjectAcl,
    ) -> StorageResult<()> {
        debug!("uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .acl(acl.canned())
            .metadata("checksum-sha256", checksum)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    async fn upload_multipart(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
        checksum: &str,
        acl: ObjectAcl,
    ) -> StorageResult<()> {
        debug!("multipart upload of {} to {}", path.display(), key);

        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(acl.canned())
            .metadata("checksum-sha256", checksum)
            .send()
            .await
            .map_err(|e| StorageError::multipart_failed(e.to_string()))?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| StorageError::multipart_failed("missing upload id"))?
            .to_string();

        match self.upload_parts(path, key, &upload_id).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| StorageError::multipart_failed(e.to_string()))?;
                Ok(())
            }
            Err(e) => {
                // Abort so the provider can reclaim the partial upload.
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key = %key, "failed to abort multipart upload: {}", abort_err);
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        path: &Path,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut parts = Vec::new();
        let mut part_number = 1i32;

        while let Some(buffer) = read_part(&mut file, PART_SIZE).await? {
            let filled = buffer.len();
            let response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buffer))
                .send()
                .await
                .map_err(|e| {
                    StorageError::multipart_failed(format!("part {part_number}: {e}"))
                })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .build(),
            );
            debug!(key = %key, part_number, bytes = filled, "uploaded part");
            part_number += 1;
        }

        Ok(parts)
    }

    /// Delete an object.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        debug!("deleting {}", key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;
        Ok(())
    }

    /// List objects under a prefix, following continuation tokens.
    pub async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        debug!("listing objects under {}", prefix);

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            for obj in response.contents() {
                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0) as u64,
                    last_modified_ms: obj
                        .last_modified()
                        .and_then(|t| t.to_millis().ok())
                        .map(|ms| ms as u64),
                });
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    /// Generate a temporary signed GET URL.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("connectivity check failed: {e}")))?;
        Ok(())
    }

    /// Public URL for a stored object.
    ///
    /// Uses the configured public base URL when present, falling back to
    /// path-style addressing on the API endpoint.
    pub fn public_url(&self, key: &str) -> StorageResult<String> {
        let base = match &self.public_base_url {
            Some(base) => base.clone(),
            None => format!("{}/{}", self.endpoint_url.trim_end_matches('/'), self.bucket),
        };
        let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        let url = base
            .join(key)
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        Ok(url.to_string())
    }
}

/// Read the next part of up to `part_size` bytes, filling across short
/// reads. Returns `None` at end of file; a final short part keeps its
/// actual length.
async fn read_part(
    file: &mut tokio::fs::File,
    part_size: usize,
) -> StorageResult<Option<Vec<u8>>> {
    let mut buffer = vec![0u8; part_size];
    let mut filled = 0;
    while filled < part_size {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled == 0 {
        return Ok(None);
    }
    buffer.truncate(filled);
    Ok(Some(buffer))
}

/// Base64-encoded SHA-256 of a file, computed in streaming fashion.
async fn sha256_base64(path: &Path) -> StorageResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(public_base_url: Option<&str>) -> StorageClient {
        StorageClient::new(StorageConfig {
            endpoint_url: "https://s3.example.com".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "videos".to_string(),
            region: "auto".to_string(),
            public_base_url: public_base_url.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_path_style_fallback() {
        let client = test_client(None);
        let url = client.public_url("uploads/2026/08/28/a.mp4").unwrap();
        assert_eq!(url, "https://s3.example.com/videos/uploads/2026/08/28/a.mp4");
    }

    #[test]
    fn test_public_url_custom_base() {
        let client = test_client(Some("https://cdn.example.com/"));
        let url = client.public_url("uploads/2026/08/28/a.mp4").unwrap();
        assert_eq!(url, "https://cdn.example.com/uploads/2026/08/28/a.mp4");
    }

    async fn part_sizes(contents: &[u8], part_size: usize) -> Vec<usize> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.bin");
        tokio::fs::write(&path, contents).await.unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        let mut sizes = Vec::new();
        while let Some(part) = read_part(&mut file, part_size).await.unwrap() {
            sizes.push(part.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_read_part_short_tail() {
        assert_eq!(part_sizes(&[7u8; 25], 10).await, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_read_part_exact_multiple_has_no_empty_tail() {
        assert_eq!(part_sizes(&[7u8; 20], 10).await, vec![10, 10]);
    }

    #[tokio::test]
    async fn test_read_part_empty_file() {
        assert!(part_sizes(&[], 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_part_preserves_contents_in_order() {
        let contents: Vec<u8> = (0..23u8).collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordered.bin");
        tokio::fs::write(&path, &contents).await.unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        let mut reassembled = Vec::new();
        while let Some(part) = read_part(&mut file, 8).await.unwrap() {
            reassembled.extend_from_slice(&part);
        }
        assert_eq!(reassembled, contents);
    }

    #[tokio::test]
    async fn test_sha256_checksum_of_known_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let checksum = sha256_base64(&path).await.unwrap();
        // sha256("hello world") in base64
        assert_eq!(checksum, "uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek=");
    }
}
