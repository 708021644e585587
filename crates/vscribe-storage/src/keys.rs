//! Object key generation and canned ACLs.

use aws_sdk_s3::types::ObjectCannedAcl;
use chrono::{DateTime, Local};
use std::path::Path;

/// Access level applied to uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectAcl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
            ObjectAcl::PublicReadWrite => "public-read-write",
        }
    }

    pub fn from_str_loose(value: &str) -> Option<Self> {
        match value.trim() {
            "private" => Some(ObjectAcl::Private),
            "public-read" => Some(ObjectAcl::PublicRead),
            "public-read-write" => Some(ObjectAcl::PublicReadWrite),
            _ => None,
        }
    }

    pub(crate) fn canned(&self) -> ObjectCannedAcl {
        match self {
            ObjectAcl::Private => ObjectCannedAcl::Private,
            ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
            ObjectAcl::PublicReadWrite => ObjectCannedAcl::PublicReadWrite,
        }
    }
}

/// Build a date-partitioned object key for an upload.
///
/// The layout is `uploads/YYYY/MM/DD/<stem>_<timestamp>.<ext>`; the
/// timestamp suffix keeps repeated uploads of the same file name from
/// overwriting each other.
pub fn generate_key(file_name: &str, at: DateTime<Local>) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .replace([' ', '/'], "_");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let date = at.format("%Y/%m/%d");
    let stamp = at.format("%Y%m%d%H%M%S");
    match ext {
        Some(ext) => format!("uploads/{date}/{stem}_{stamp}.{ext}"),
        None => format!("uploads/{date}/{stem}_{stamp}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_key_layout() {
        let at = Local.with_ymd_and_hms(2026, 8, 28, 12, 30, 45).unwrap();
        let key = generate_key("beach walk.mp4", at);
        assert_eq!(key, "uploads/2026/08/28/beach_walk_20260828123045.mp4");
    }

    #[test]
    fn test_generate_key_without_extension() {
        let at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let key = generate_key("rawclip", at);
        assert_eq!(key, "uploads/2026/01/02/rawclip_20260102030405");
    }

    #[test]
    fn test_acl_parse() {
        assert_eq!(ObjectAcl::from_str_loose("public-read"), Some(ObjectAcl::PublicRead));
        assert_eq!(ObjectAcl::from_str_loose("nope"), None);
        assert_eq!(ObjectAcl::default().as_str(), "private");
    }
}
