//! Application configuration.
//!
//! Everything comes from environment variables (usually via `.env`). Each
//! destination and the storage mirror are independently optional; the core
//! analyze path only needs the inference key.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vscribe_storage::ObjectAcl;

/// Table (bitable) destination settings.
#[derive(Debug, Clone)]
pub struct TableSettings {
    pub app_token: String,
    pub table_id: String,
}

/// Spreadsheet destination settings.
#[derive(Debug, Clone)]
pub struct SheetSettings {
    pub spreadsheet_token: String,
    pub sheet_id: String,
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Field mapping config file
    pub mapping_path: PathBuf,
    /// Largest accepted input file, in megabytes
    pub max_file_size_mb: u64,
    /// Accepted file extensions, lowercase without dots
    pub supported_formats: Vec<String>,
    /// Mirror accepted files to object storage
    pub storage_enabled: bool,
    pub storage_acl: ObjectAcl,
    /// Push to destinations right after a successful analysis
    pub auto_sync: bool,
    /// Quiet window before a watched file is processed
    pub watch_debounce_secs: u64,
    pub table: Option<TableSettings>,
    pub sheet: Option<SheetSettings>,
    /// Document destination: the document ID
    pub doc: Option<String>,
}

impl AppConfig {
    /// Load config from environment variables.
    pub fn from_env() -> Result<Self> {
        let supported_formats = std::env::var("SUPPORTED_VIDEO_FORMATS")
            .unwrap_or_else(|_| "mp4,avi,mov,mkv,webm".to_string())
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let storage_acl = std::env::var("S3_OBJECT_ACL")
            .ok()
            .map(|v| {
                ObjectAcl::from_str_loose(&v)
                    .with_context(|| format!("invalid S3_OBJECT_ACL value: {v}"))
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            db_path: std::env::var("VSCRIBE_DB_PATH")
                .unwrap_or_else(|_| "vscribe.db".to_string())
                .into(),
            mapping_path: std::env::var("VSCRIBE_MAPPING_CONFIG")
                .unwrap_or_else(|_| "field_mapping.json".to_string())
                .into(),
            max_file_size_mb: env_parsed("MAX_FILE_SIZE_MB", 100),
            supported_formats,
            storage_enabled: env_flag("S3_ENABLED", false),
            storage_acl,
            auto_sync: env_flag("AUTO_SYNC", true),
            watch_debounce_secs: env_parsed("WATCH_DEBOUNCE_SECS", 5),
            table: table_settings(),
            sheet: sheet_settings(),
            doc: enabled_value("LARK_DOC_ENABLED", "LARK_DOCUMENT_ID"),
        })
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Whether any sync destination is configured.
    pub fn any_destination(&self) -> bool {
        self.table.is_some() || self.sheet.is_some() || self.doc.is_some()
    }
}

fn table_settings() -> Option<TableSettings> {
    if !env_flag("LARK_TABLE_ENABLED", false) {
        return None;
    }
    Some(TableSettings {
        app_token: std::env::var("LARK_BITABLE_APP_TOKEN").ok()?,
        table_id: std::env::var("LARK_TABLE_ID").ok()?,
    })
}

fn sheet_settings() -> Option<SheetSettings> {
    if !env_flag("LARK_SHEET_ENABLED", false) {
        return None;
    }
    Some(SheetSettings {
        spreadsheet_token: std::env::var("LARK_SPREADSHEET_TOKEN").ok()?,
        sheet_id: std::env::var("LARK_SHEET_ID").ok()?,
    })
}

fn enabled_value(flag: &str, var: &str) -> Option<String> {
    if !env_flag(flag, false) {
        return None;
    }
    std::env::var(var).ok()
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Set or replace one `KEY=value` line in an env file, keeping every other
/// line (including comments and blanks) exactly as it was. Creates the file
/// when missing.
pub fn update_env_file(path: impl AsRef<Path>, key: &str, value: &str) -> Result<()> {
    let path = path.as_ref();
    let existing = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    for line in existing.lines() {
        let trimmed = line.trim_start();
        let is_target = !trimmed.starts_with('#')
            && trimmed
                .split_once('=')
                .map(|(k, _)| k.trim() == key)
                .unwrap_or(false);
        if is_target && !replaced {
            lines.push(format!("{key}={value}"));
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(format!("{key}={value}"));
    }

    let mut output = lines.join("\n");
    output.push('\n');
    std::fs::write(path, output).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_env_file_preserves_unrelated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# comment stays\nGEMINI_API_KEY=old\n\nAUTO_SYNC=true\n",
        )
        .unwrap();

        update_env_file(&path, "GEMINI_API_KEY", "new-key").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "# comment stays\nGEMINI_API_KEY=new-key\n\nAUTO_SYNC=true\n"
        );
    }

    #[test]
    fn test_update_env_file_appends_new_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "AUTO_SYNC=true\n").unwrap();

        update_env_file(&path, "LARK_APP_ID", "cli_x").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "AUTO_SYNC=true\nLARK_APP_ID=cli_x\n");
    }

    #[test]
    fn test_update_env_file_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        update_env_file(&path, "GEMINI_API_KEY", "k").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "GEMINI_API_KEY=k\n");
    }

    #[test]
    fn test_update_env_file_ignores_commented_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# GEMINI_API_KEY=commented\n").unwrap();

        update_env_file(&path, "GEMINI_API_KEY", "k").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "# GEMINI_API_KEY=commented\nGEMINI_API_KEY=k\n");
    }
}
