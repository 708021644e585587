//! Input file validation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use vscribe_models::guess_mime;

use crate::config::AppConfig;

/// A validated input file.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub mime_type: &'static str,
}

/// Check an input file against the configured limits before any network
/// traffic happens.
pub fn validate_file(path: impl AsRef<Path>, config: &AppConfig) -> Result<ValidatedFile> {
    let path = path.as_ref();

    if !path.exists() {
        bail!("file does not exist: {}", path.display());
    }
    if !path.is_file() {
        bail!("not a regular file: {}", path.display());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !config.supported_formats.contains(&extension) {
        bail!(
            "unsupported format '{}' (supported: {})",
            extension,
            config.supported_formats.join(", ")
        );
    }

    let Some(mime_type) = guess_mime(path) else {
        bail!("unrecognized video type: {}", path.display());
    };
    if !mime_type.starts_with("video/") {
        bail!("not a video file: {}", path.display());
    }

    let size = path.metadata()?.len();
    if size == 0 {
        bail!("file is empty: {}", path.display());
    }
    if size > config.max_file_size_bytes() {
        bail!(
            "file is {:.1} MB, over the {} MB limit",
            size as f64 / 1024.0 / 1024.0,
            config.max_file_size_mb
        );
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ValidatedFile {
        path: path.to_path_buf(),
        file_name,
        size,
        mime_type,
    })
}
