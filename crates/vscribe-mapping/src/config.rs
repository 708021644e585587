//! User-editable field mapping configuration.
//!
//! The config is a JSON file the user can edit by hand. It declares the
//! fields the inference side produces, the fields each destination expects,
//! the mapping between them, and optional per-field transforms.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use vscribe_models::CanonicalField;

use crate::error::{MappingError, MappingResult};

/// Declared shape of a field the inference side produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiFieldSpec {
    pub field_type: String,
    pub description: String,
    #[serde(default)]
    pub example: String,
}

/// Declared shape of a field a destination table expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationFieldSpec {
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// A value transform applied while mapping a field to its destination.
///
/// Unknown rule types deserialize to [`TransformRule::Unknown`] and pass the
/// value through untouched, so configs written against a newer version still
/// load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformRule {
    SplitAndJoin {
        #[serde(default = "default_separator")]
        separator: String,
        #[serde(default = "default_join_length")]
        max_length: usize,
    },
    TextLimit {
        #[serde(default = "default_text_length")]
        max_length: usize,
    },
    #[serde(other)]
    Unknown,
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_join_length() -> usize {
    200
}

fn default_text_length() -> usize {
    1000
}

impl TransformRule {
    /// Apply the rule to a value. Truncation is character-based so multibyte
    /// text is never split mid-character.
    pub fn apply(&self, value: &str) -> String {
        match self {
            TransformRule::SplitAndJoin {
                separator,
                max_length,
            } => {
                let joined = value
                    .split(separator.as_str())
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join(separator);
                truncate_with_ellipsis(&joined, *max_length)
            }
            TransformRule::TextLimit { max_length } => truncate_with_ellipsis(value, *max_length),
            TransformRule::Unknown => value.to_string(),
        }
    }
}

fn truncate_with_ellipsis(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    // Caps too small to hold the ellipsis get a plain cut.
    if max_chars < 3 {
        return value.chars().take(max_chars).collect();
    }
    let mut out: String = value.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// Field mapping configuration, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappingConfig {
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub description: String,
    pub ai_fields: BTreeMap<String, AiFieldSpec>,
    pub destination_fields: BTreeMap<String, DestinationFieldSpec>,
    /// AI field identifier to destination field name.
    pub mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub transforms: BTreeMap<String, TransformRule>,
}

impl FieldMappingConfig {
    /// The built-in mapping: canonical English identifiers to the Chinese
    /// column names the destination tables use.
    pub fn default_config() -> Self {
        let now = Utc::now().to_rfc3339();

        let mut ai_fields = BTreeMap::new();
        let mut destination_fields = BTreeMap::new();
        let mut mappings = BTreeMap::new();
        for field in CanonicalField::ALL {
            ai_fields.insert(
                field.key().to_string(),
                AiFieldSpec {
                    field_type: "text".to_string(),
                    description: field.display_name().to_string(),
                    example: String::new(),
                },
            );
            destination_fields.insert(
                field.display_name().to_string(),
                DestinationFieldSpec {
                    field_type: "text".to_string(),
                    required: field == CanonicalField::SerialNumber,
                    description: String::new(),
                },
            );
            mappings.insert(field.key().to_string(), field.display_name().to_string());
        }

        let mut transforms = BTreeMap::new();
        transforms.insert(
            CanonicalField::KeywordTags.key().to_string(),
            TransformRule::SplitAndJoin {
                separator: default_separator(),
                max_length: default_join_length(),
            },
        );
        transforms.insert(
            CanonicalField::ContentSummary.key().to_string(),
            TransformRule::TextLimit {
                max_length: default_text_length(),
            },
        );

        Self {
            version: "1.0".to_string(),
            created_at: now.clone(),
            updated_at: now,
            description: "视频分析字段映射配置".to_string(),
            ai_fields,
            destination_fields,
            mappings,
            transforms,
        }
    }

    /// Load a config from disk. Missing or malformed files are errors; use
    /// [`FieldMappingConfig::load_or_create`] to fall back to the default.
    pub fn load(path: impl AsRef<Path>) -> MappingResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MappingError::config_not_found(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| MappingError::config_malformed(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Load a config, writing and returning the default when the file does
    /// not exist yet. A malformed existing file is still an error.
    pub fn load_or_create(path: impl AsRef<Path>) -> MappingResult<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(MappingError::ConfigNotFound(_)) => {
                let config = Self::default_config();
                config.save(path)?;
                info!(path = %path.display(), "wrote default field mapping config");
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the config to disk, refreshing `updated_at`.
    pub fn save(&self, path: impl AsRef<Path>) -> MappingResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut to_write = self.clone();
        to_write.updated_at = Utc::now().to_rfc3339();
        let text = serde_json::to_string_pretty(&to_write)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check internal consistency. Returns one message per problem, empty
    /// when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.mappings.is_empty() {
            problems.push("mappings is empty".to_string());
        }

        for (ai_field, dest_field) in &self.mappings {
            if !self.ai_fields.contains_key(ai_field) {
                problems.push(format!("mapping source '{ai_field}' is not declared in ai_fields"));
            }
            if !self.destination_fields.contains_key(dest_field) {
                problems.push(format!(
                    "mapping target '{dest_field}' is not declared in destination_fields"
                ));
            }
        }

        for ai_field in self.transforms.keys() {
            if !self.mappings.contains_key(ai_field) {
                problems.push(format!("transform on '{ai_field}' has no matching mapping"));
            }
        }

        for (name, spec) in &self.destination_fields {
            if spec.required && !self.mappings.values().any(|v| v == name) {
                problems.push(format!("required destination field '{name}' is never mapped"));
            }
        }

        problems
    }
}
