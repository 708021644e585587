//! Sequence-ID generation.

use chrono::Local;
use uuid::Uuid;

/// Generate a 22-character sequence ID: a 14-digit local timestamp followed
/// by 8 uppercase hex characters from a random UUID.
///
/// This is the external-facing primary key for analysis records; the
/// timestamp prefix keeps IDs roughly sortable by creation time.
pub fn generate_sequence_id() -> String {
    let timestamp = Local::now().format("%Y%m%d%H%M%S");
    let random_part: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("{timestamp}{random_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_id_length() {
        let id = generate_sequence_id();
        assert_eq!(id.len(), 22);
        assert!(id[..14].chars().all(|c| c.is_ascii_digit()));
        assert!(id[14..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sequence_ids_are_unique() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(generate_sequence_id()));
        }
    }
}
