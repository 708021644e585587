//! Analysis records and per-destination sync state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync state of a record against one remote destination.
///
/// Stored as an integer column per destination; the numeric values are part
/// of the on-disk schema and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never pushed to the destination
    #[default]
    Unsynced,
    /// Last push succeeded; remote reference is current
    Synced,
    /// Last push failed
    Failed,
}

impl SyncState {
    /// Get string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unsynced => "unsynced",
            SyncState::Synced => "synced",
            SyncState::Failed => "failed",
        }
    }

    /// Integer form used in the datastore.
    pub fn as_i64(&self) -> i64 {
        match self {
            SyncState::Unsynced => 0,
            SyncState::Synced => 1,
            SyncState::Failed => 2,
        }
    }

    /// Decode the datastore integer; unknown values read as `Unsynced`.
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => SyncState::Synced,
            2 => SyncState::Failed,
            _ => SyncState::Unsynced,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One analyzed video, as persisted in the local datastore.
///
/// Each destination gets its own disjoint set of sync columns so that
/// concurrent syncs to different destinations never touch the same fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Local rowid
    pub id: i64,
    /// External-facing primary key (timestamp + random suffix)
    pub sequence_id: String,
    /// Source file path
    pub file_path: String,
    /// Source file name
    pub file_name: String,
    /// Source file size in bytes
    pub file_size: i64,
    /// Guessed MIME type
    pub mime_type: Option<String>,
    /// Prompt text used for this analysis
    pub analysis_prompt: String,
    /// Raw result text from the inference service
    pub analysis_result: String,
    /// File URI returned by the inference service upload
    pub inference_file_uri: Option<String>,
    /// File name assigned by the inference service
    pub inference_file_name: Option<String>,
    /// Object-storage URL, when the file was mirrored
    pub storage_url: Option<String>,
    /// Object-storage key
    pub storage_key: Option<String>,
    /// Parsed content summary (denormalized for display)
    pub content_summary: Option<String>,
    /// Parsed detailed description
    pub detailed_description: Option<String>,
    /// Parsed keyword tags
    pub keyword_tags: Option<String>,
    /// Parsed main objects
    pub main_objects: Option<String>,
    /// Remote record ID in the table destination
    pub table_record_id: Option<String>,
    pub table_sync_status: SyncState,
    pub table_sync_time: Option<DateTime<Utc>>,
    /// Row number in the spreadsheet destination
    pub sheet_row: Option<i64>,
    pub sheet_sync_status: SyncState,
    pub sheet_sync_time: Option<DateTime<Utc>>,
    /// The document destination has no row concept, only a status
    pub doc_sync_status: SyncState,
    pub doc_sync_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for persisting a fresh analysis result.
#[derive(Debug, Clone, Default)]
pub struct NewAnalysis {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub analysis_prompt: String,
    pub analysis_result: String,
    pub inference_file_uri: Option<String>,
    pub inference_file_name: Option<String>,
    pub storage_url: Option<String>,
    pub storage_key: Option<String>,
    pub content_summary: Option<String>,
    pub detailed_description: Option<String>,
    pub keyword_tags: Option<String>,
    pub main_objects: Option<String>,
}
