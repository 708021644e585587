//! The canonical field set and adaptation output types.
//!
//! The inference service is asked to return six conceptual fields per video.
//! Everything downstream of the parser works against this fixed set rather
//! than an open-ended map, so a missing field is caught at construction time
//! instead of at sync time.

use serde::{Deserialize, Serialize};

/// The six canonical analysis fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    SerialNumber,
    ContentSummary,
    DetailedDescription,
    KeywordTags,
    MainObjects,
    SourcePath,
}

impl CanonicalField {
    /// All canonical fields, in display order.
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::SerialNumber,
        CanonicalField::ContentSummary,
        CanonicalField::DetailedDescription,
        CanonicalField::KeywordTags,
        CanonicalField::MainObjects,
        CanonicalField::SourcePath,
    ];

    /// Stable English identifier, used in mapping configs and parsed output.
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::SerialNumber => "video_serial_number",
            CanonicalField::ContentSummary => "video_content_summary",
            CanonicalField::DetailedDescription => "detailed_content_description",
            CanonicalField::KeywordTags => "keywords_tags",
            CanonicalField::MainObjects => "main_characters_objects",
            CanonicalField::SourcePath => "video_source_path",
        }
    }

    /// Display name as it appears in model output and destination tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            CanonicalField::SerialNumber => "视频序列号",
            CanonicalField::ContentSummary => "视频内容摘要",
            CanonicalField::DetailedDescription => "详细内容描述",
            CanonicalField::KeywordTags => "关键词标签",
            CanonicalField::MainObjects => "主要对象",
            CanonicalField::SourcePath => "视频源路径",
        }
    }

    /// Look up a field by its English identifier.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Exactly the six canonical fields, empty string when unpopulated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptedFields {
    pub video_serial_number: String,
    pub video_content_summary: String,
    pub detailed_content_description: String,
    pub keywords_tags: String,
    pub main_characters_objects: String,
    pub video_source_path: String,
}

impl AdaptedFields {
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::SerialNumber => &self.video_serial_number,
            CanonicalField::ContentSummary => &self.video_content_summary,
            CanonicalField::DetailedDescription => &self.detailed_content_description,
            CanonicalField::KeywordTags => &self.keywords_tags,
            CanonicalField::MainObjects => &self.main_characters_objects,
            CanonicalField::SourcePath => &self.video_source_path,
        }
    }

    pub fn set(&mut self, field: CanonicalField, value: impl Into<String>) {
        let slot = match field {
            CanonicalField::SerialNumber => &mut self.video_serial_number,
            CanonicalField::ContentSummary => &mut self.video_content_summary,
            CanonicalField::DetailedDescription => &mut self.detailed_content_description,
            CanonicalField::KeywordTags => &mut self.keywords_tags,
            CanonicalField::MainObjects => &mut self.main_characters_objects,
            CanonicalField::SourcePath => &mut self.video_source_path,
        };
        *slot = value.into();
    }

    /// Iterate fields as `(english_key, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        CanonicalField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

/// Which canonical fields came back populated versus empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub populated: Vec<CanonicalField>,
    pub empty: Vec<CanonicalField>,
    pub success_rate: f64,
}

impl ValidationReport {
    /// Build a report from adapted fields.
    pub fn from_fields(fields: &AdaptedFields) -> Self {
        let mut populated = Vec::new();
        let mut empty = Vec::new();
        for (field, value) in fields.iter() {
            if value.trim().is_empty() {
                empty.push(field);
            } else {
                populated.push(field);
            }
        }
        let success_rate = populated.len() as f64 / CanonicalField::ALL.len() as f64;
        Self {
            populated,
            empty,
            success_rate,
        }
    }
}

/// Adapter output: the fixed field set plus its validation summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptedOutput {
    pub fields: AdaptedFields,
    pub validation: ValidationReport,
}
