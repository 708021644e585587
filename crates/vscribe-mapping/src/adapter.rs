//! Normalization of parsed output against the canonical field set.

use std::collections::BTreeMap;

use tracing::debug;
use vscribe_models::{AdaptedFields, AdaptedOutput, CanonicalField, ValidationReport};

/// Normalize a parsed key/value map into the fixed six-field shape.
///
/// Keys already carry canonical identifiers when the parser recognized them;
/// anything unrecognized is dropped here. Fields with no match come through
/// as empty strings, never as errors.
pub fn adapt(parsed: &BTreeMap<String, String>) -> AdaptedOutput {
    let mut fields = AdaptedFields::default();

    for (key, value) in parsed {
        // Fallback parses emit plain "summary"/"detailed_description" keys,
        // so run them through synonym normalization once more.
        match CanonicalField::from_key(&crate::parser::canonical_key(key)) {
            Some(field) => fields.set(field, value.trim()),
            None => debug!("dropping unrecognized field: {}", key),
        }
    }

    let validation = ValidationReport::from_fields(&fields);
    AdaptedOutput { fields, validation }
}
