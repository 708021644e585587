//! Concrete push targets.

pub mod doc;
pub mod sheet;
pub mod table;

pub use doc::DocDestination;
pub use sheet::SheetDestination;
pub use table::TableDestination;

use vscribe_mapping::{adapt, parse};
use vscribe_models::{AdaptedFields, AnalysisRecord, CanonicalField};

/// Canonical fields for a record, re-parsed from the stored raw result.
///
/// The serial number and source path always come from the local record, not
/// from whatever the model answered: the sequence ID is the join key across
/// destinations, and the path points at the mirrored URL when one exists.
pub(crate) fn fields_for(record: &AnalysisRecord) -> AdaptedFields {
    let mut fields = adapt(&parse(&record.analysis_result)).fields;
    fields.set(CanonicalField::SerialNumber, record.sequence_id.clone());
    let source = record
        .storage_url
        .clone()
        .unwrap_or_else(|| record.file_path.clone());
    fields.set(CanonicalField::SourcePath, source);
    fields
}

#[cfg(test)]
pub(crate) fn sample_record() -> AnalysisRecord {
    use chrono::Utc;
    use vscribe_models::SyncState;

    AnalysisRecord {
        id: 1,
        sequence_id: "20260828120000ABCD1234".to_string(),
        file_path: "/videos/beach.mp4".to_string(),
        file_name: "beach.mp4".to_string(),
        file_size: 1024,
        mime_type: Some("video/mp4".to_string()),
        analysis_prompt: "分析".to_string(),
        analysis_result: "视频序列号: WRONG\n摘要: 海边散步\n关键词标签: 海边,散步".to_string(),
        inference_file_uri: None,
        inference_file_name: None,
        storage_url: None,
        storage_key: None,
        content_summary: Some("海边散步".to_string()),
        detailed_description: Some("一个人在海边散步。".to_string()),
        keyword_tags: Some("海边,散步".to_string()),
        main_objects: Some("人,海".to_string()),
        table_record_id: None,
        table_sync_status: SyncState::Unsynced,
        table_sync_time: None,
        sheet_row: None,
        sheet_sync_status: SyncState::Unsynced,
        sheet_sync_time: None,
        doc_sync_status: SyncState::Unsynced,
        doc_sync_time: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_record_overrides_model_serial() {
        let record = sample_record();
        let fields = fields_for(&record);
        assert_eq!(fields.video_serial_number, "20260828120000ABCD1234");
        assert_eq!(fields.video_source_path, "/videos/beach.mp4");
        assert_eq!(fields.keywords_tags, "海边,散步");
    }

    #[test]
    fn test_storage_url_preferred_as_source() {
        let mut record = sample_record();
        record.storage_url = Some("https://cdn.example.com/a.mp4".to_string());
        let fields = fields_for(&record);
        assert_eq!(fields.video_source_path, "https://cdn.example.com/a.mp4");
    }
}
