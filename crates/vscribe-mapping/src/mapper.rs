//! Applies a mapping config to adapted fields.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;
use vscribe_models::AdaptedFields;

use crate::config::FieldMappingConfig;
use crate::error::{MappingError, MappingResult};

/// Maps adapted fields to destination-shaped records under a user config.
///
/// The mapper is strict about configuration: a missing, malformed, or
/// inconsistent config is a hard error. Mapping itself never fails; blank
/// input maps to an empty record.
#[derive(Debug, Clone)]
pub struct CustomFieldMapper {
    config: FieldMappingConfig,
}

impl CustomFieldMapper {
    /// Build a mapper from an already-loaded config, rejecting inconsistent
    /// ones up front.
    pub fn new(config: FieldMappingConfig) -> MappingResult<Self> {
        if config.mappings.is_empty() {
            return Err(MappingError::EmptyMappings);
        }
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(MappingError::Incomplete(problems));
        }
        Ok(Self { config })
    }

    /// Load the config at `path` and build a mapper from it.
    pub fn from_path(path: impl AsRef<Path>) -> MappingResult<Self> {
        Self::new(FieldMappingConfig::load(path)?)
    }

    pub fn config(&self) -> &FieldMappingConfig {
        &self.config
    }

    /// Map adapted fields to `destination field name -> value`.
    ///
    /// Empty source fields are skipped rather than written as empty cells.
    pub fn map_fields(&self, fields: &AdaptedFields) -> MappingResult<BTreeMap<String, String>> {
        let mut record = BTreeMap::new();

        for (ai_field, dest_field) in &self.config.mappings {
            let value = fields
                .iter()
                .find(|(f, _)| f.key() == ai_field)
                .map(|(_, v)| v)
                .unwrap_or_default();
            if value.trim().is_empty() {
                debug!("skipping empty source field: {}", ai_field);
                continue;
            }

            let value = match self.config.transforms.get(ai_field) {
                Some(rule) => rule.apply(value),
                None => value.to_string(),
            };
            record.insert(dest_field.clone(), value);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscribe_models::CanonicalField;

    fn sample_fields() -> AdaptedFields {
        let mut fields = AdaptedFields::default();
        fields.set(CanonicalField::SerialNumber, "20250101120000ABCD1234");
        fields.set(CanonicalField::ContentSummary, "一段海边散步的视频");
        fields.set(CanonicalField::KeywordTags, "海边, 散步 ,狗");
        fields
    }

    #[test]
    fn test_map_with_default_config() {
        let mapper = CustomFieldMapper::new(FieldMappingConfig::default_config()).expect("mapper");
        let record = mapper.map_fields(&sample_fields()).expect("map");

        assert_eq!(record["视频序列号"], "20250101120000ABCD1234");
        assert_eq!(record["视频内容摘要"], "一段海边散步的视频");
        assert_eq!(record["关键词标签"], "海边,散步,狗");
        assert!(!record.contains_key("主要对象"));
    }

    #[test]
    fn test_empty_mappings_rejected() {
        let mut config = FieldMappingConfig::default_config();
        config.mappings.clear();
        assert!(matches!(
            CustomFieldMapper::new(config),
            Err(MappingError::EmptyMappings)
        ));
    }

    #[test]
    fn test_inconsistent_config_rejected() {
        let mut config = FieldMappingConfig::default_config();
        config
            .mappings
            .insert("phantom".to_string(), "幻影".to_string());
        assert!(matches!(
            CustomFieldMapper::new(config),
            Err(MappingError::Incomplete(_))
        ));
    }

    #[test]
    fn test_all_empty_fields_map_to_empty_record() {
        let mapper = CustomFieldMapper::new(FieldMappingConfig::default_config()).expect("mapper");
        let record = mapper.map_fields(&AdaptedFields::default()).expect("map");
        assert!(record.is_empty());
    }

    #[test]
    fn test_empty_input_round_trip_never_fails() {
        let mapper = CustomFieldMapper::new(FieldMappingConfig::default_config()).expect("mapper");
        for raw in ["", "   ", "\n\n"] {
            let output = crate::adapter::adapt(&crate::parser::parse(raw));
            assert!(mapper.map_fields(&output.fields).is_ok(), "raw: {raw:?}");
        }
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(matches!(
            CustomFieldMapper::from_path("/nonexistent/mapping.json"),
            Err(MappingError::ConfigNotFound(_))
        ));
    }
}
