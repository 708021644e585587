//! The local analysis datastore.
//!
//! Every call opens a fresh connection against the database file. SQLite
//! serializes writers itself, so short-lived connections keep the store
//! usable from blocking worker threads without a connection pool.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use vscribe_models::{
    generate_sequence_id, AnalysisRecord, NewAnalysis, QuickPrompt, SyncState,
};

use crate::error::{StoreError, StoreResult};
use crate::schema;

/// Which destination's sync columns an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSlot {
    Table,
    Sheet,
    Doc,
}

impl SyncSlot {
    fn status_column(&self) -> &'static str {
        match self {
            SyncSlot::Table => "table_sync_status",
            SyncSlot::Sheet => "sheet_sync_status",
            SyncSlot::Doc => "doc_sync_status",
        }
    }

    fn time_column(&self) -> &'static str {
        match self {
            SyncSlot::Table => "table_sync_time",
            SyncSlot::Sheet => "sheet_sync_time",
            SyncSlot::Doc => "doc_sync_time",
        }
    }
}

/// Aggregate counts across the store.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Statistics {
    pub total: i64,
    pub table_synced: i64,
    pub table_failed: i64,
    pub sheet_synced: i64,
    pub sheet_failed: i64,
    pub doc_synced: i64,
    pub doc_failed: i64,
}

const RECORD_COLUMNS: &str = "id, sequence_id, file_path, file_name, file_size, mime_type, \
     analysis_prompt, analysis_result, inference_file_uri, inference_file_name, \
     storage_url, storage_key, content_summary, detailed_description, keyword_tags, \
     main_objects, table_record_id, table_sync_status, table_sync_time, sheet_row, \
     sheet_sync_status, sheet_sync_time, doc_sync_status, doc_sync_time, created_at, updated_at";

/// Handle to the analysis database.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path`, run schema
    /// upgrades, and seed the built-in prompts when the prompt table is
    /// empty.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self { path };
        let conn = db.conn()?;
        schema::init_schema(&conn)?;
        db.seed_prompts(&conn)?;
        info!(path = %db.path.display(), "datastore ready");
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> StoreResult<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    // ---- analysis records ----

    /// Persist a fresh analysis, generating its sequence ID and timestamps.
    pub fn save_analysis(&self, input: &NewAnalysis) -> StoreResult<AnalysisRecord> {
        let conn = self.conn()?;
        let sequence_id = generate_sequence_id();
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO video_analysis (
                sequence_id, file_path, file_name, file_size, mime_type,
                analysis_prompt, analysis_result, inference_file_uri,
                inference_file_name, storage_url, storage_key, content_summary,
                detailed_description, keyword_tags, main_objects,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                sequence_id,
                input.file_path,
                input.file_name,
                input.file_size,
                input.mime_type,
                input.analysis_prompt,
                input.analysis_result,
                input.inference_file_uri,
                input.inference_file_name,
                input.storage_url,
                input.storage_key,
                input.content_summary,
                input.detailed_description,
                input.keyword_tags,
                input.main_objects,
                now,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, %sequence_id, "saved analysis record");
        self.get(id)?
            .ok_or_else(|| StoreError::not_found(format!("record {id} after insert")))
    }

    pub fn get(&self, id: i64) -> StoreResult<Option<AnalysisRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM video_analysis WHERE id = ?1"),
                [id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_by_sequence(&self, sequence_id: &str) -> StoreResult<Option<AnalysisRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM video_analysis WHERE sequence_id = ?1"),
                [sequence_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Newest-first page of records.
    pub fn list(&self, limit: usize, offset: usize) -> StoreResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM video_analysis \
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let records = stmt
            .query_map(params![limit as i64, offset as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Every record, oldest first. Used by forced full syncs.
    pub fn list_all(&self) -> StoreResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM video_analysis ORDER BY created_at ASC, id ASC"
        ))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM video_analysis", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Substring search across file name and the parsed text fields.
    pub fn search(&self, keyword: &str, limit: usize) -> StoreResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let pattern = format!("%{keyword}%");
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM video_analysis \
             WHERE file_name LIKE ?1 OR content_summary LIKE ?1 \
                OR detailed_description LIKE ?1 OR keyword_tags LIKE ?1 \
                OR main_objects LIKE ?1 OR sequence_id LIKE ?1 \
             ORDER BY created_at DESC LIMIT ?2"
        ))?;
        let records = stmt
            .query_map(params![pattern, limit as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete one record. Returns false when the ID does not exist.
    pub fn delete(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM video_analysis WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    pub fn delete_many(&self, ids: &[i64]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute("DELETE FROM video_analysis WHERE id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    pub fn delete_all(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM video_analysis", [])?;
        Ok(deleted)
    }

    // ---- sync bookkeeping ----

    /// Records not yet successfully synced to the given destination.
    pub fn unsynced(&self, slot: SyncSlot) -> StoreResult<Vec<AnalysisRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM video_analysis \
             WHERE {} != ?1 ORDER BY created_at ASC",
            slot.status_column()
        ))?;
        let records = stmt
            .query_map([SyncState::Synced.as_i64()], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Set a record's sync state for one destination, stamping the sync time.
    pub fn set_sync_state(&self, id: i64, slot: SyncSlot, state: SyncState) -> StoreResult<()> {
        let conn = self.conn()?;
        let now = Utc::now();
        let affected = conn.execute(
            &format!(
                "UPDATE video_analysis SET {} = ?1, {} = ?2, updated_at = ?2 WHERE id = ?3",
                slot.status_column(),
                slot.time_column()
            ),
            params![state.as_i64(), now, id],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(format!("record {id}")));
        }
        Ok(())
    }

    /// Set or clear the remote record reference for the table destination.
    pub fn set_table_record_id(&self, id: i64, record_id: Option<&str>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE video_analysis SET table_record_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![record_id, Utc::now(), id],
        )?;
        Ok(())
    }

    /// Set or clear the spreadsheet row reference.
    pub fn set_sheet_row(&self, id: i64, row: Option<i64>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE video_analysis SET sheet_row = ?1, updated_at = ?2 WHERE id = ?3",
            params![row, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn statistics(&self) -> StoreResult<Statistics> {
        let conn = self.conn()?;
        let row = conn.query_row(
            r#"
            SELECT COUNT(*),
                SUM(table_sync_status = 1), SUM(table_sync_status = 2),
                SUM(sheet_sync_status = 1), SUM(sheet_sync_status = 2),
                SUM(doc_sync_status = 1), SUM(doc_sync_status = 2)
            FROM video_analysis
            "#,
            [],
            |row| {
                Ok(Statistics {
                    total: row.get(0)?,
                    table_synced: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    table_failed: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    sheet_synced: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    sheet_failed: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                    doc_synced: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    doc_failed: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                })
            },
        )?;
        Ok(row)
    }

    // ---- quick prompts ----

    fn seed_prompts(&self, conn: &Connection) -> StoreResult<()> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM quick_prompts", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        let now = Utc::now();
        for (name, text, description) in DEFAULT_PROMPTS {
            conn.execute(
                r#"
                INSERT INTO quick_prompts (name, prompt_text, description, is_default, created_at, updated_at)
                VALUES (?1, ?2, ?3, 1, ?4, ?4)
                "#,
                params![name, text, description, now],
            )?;
        }
        info!(count = DEFAULT_PROMPTS.len(), "seeded default prompts");
        Ok(())
    }

    pub fn list_prompts(&self) -> StoreResult<Vec<QuickPrompt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, prompt_text, description, is_default, created_at, updated_at \
             FROM quick_prompts ORDER BY is_default DESC, name ASC",
        )?;
        let prompts = stmt
            .query_map([], row_to_prompt)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(prompts)
    }

    pub fn get_prompt(&self, name: &str) -> StoreResult<Option<QuickPrompt>> {
        let conn = self.conn()?;
        let prompt = conn
            .query_row(
                "SELECT id, name, prompt_text, description, is_default, created_at, updated_at \
                 FROM quick_prompts WHERE name = ?1",
                [name],
                row_to_prompt,
            )
            .optional()?;
        Ok(prompt)
    }

    pub fn add_prompt(
        &self,
        name: &str,
        prompt_text: &str,
        description: Option<&str>,
    ) -> StoreResult<QuickPrompt> {
        let conn = self.conn()?;
        let now = Utc::now();
        let result = conn.execute(
            r#"
            INSERT INTO quick_prompts (name, prompt_text, description, is_default, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?4)
            "#,
            params![name, prompt_text, description, now],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicatePrompt(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        self.get_prompt(name)?
            .ok_or_else(|| StoreError::not_found(format!("prompt '{name}' after insert")))
    }

    pub fn update_prompt(
        &self,
        name: &str,
        prompt_text: &str,
        description: Option<&str>,
    ) -> StoreResult<QuickPrompt> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE quick_prompts SET prompt_text = ?1, description = ?2, updated_at = ?3 \
             WHERE name = ?4",
            params![prompt_text, description, Utc::now(), name],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(format!("prompt '{name}'")));
        }
        self.get_prompt(name)?
            .ok_or_else(|| StoreError::not_found(format!("prompt '{name}'")))
    }

    /// Delete a prompt by name. Seeded prompts are deletable like any other.
    pub fn delete_prompt(&self, name: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM quick_prompts WHERE name = ?1", [name])?;
        Ok(affected > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    Ok(AnalysisRecord {
        id: row.get(0)?,
        sequence_id: row.get(1)?,
        file_path: row.get(2)?,
        file_name: row.get(3)?,
        file_size: row.get(4)?,
        mime_type: row.get(5)?,
        analysis_prompt: row.get(6)?,
        analysis_result: row.get(7)?,
        inference_file_uri: row.get(8)?,
        inference_file_name: row.get(9)?,
        storage_url: row.get(10)?,
        storage_key: row.get(11)?,
        content_summary: row.get(12)?,
        detailed_description: row.get(13)?,
        keyword_tags: row.get(14)?,
        main_objects: row.get(15)?,
        table_record_id: row.get(16)?,
        table_sync_status: SyncState::from_i64(row.get(17)?),
        table_sync_time: row.get(18)?,
        sheet_row: row.get(19)?,
        sheet_sync_status: SyncState::from_i64(row.get(20)?),
        sheet_sync_time: row.get(21)?,
        doc_sync_status: SyncState::from_i64(row.get(22)?),
        doc_sync_time: row.get(23)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
    })
}

fn row_to_prompt(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuickPrompt> {
    Ok(QuickPrompt {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt_text: row.get(2)?,
        description: row.get(3)?,
        is_default: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Prompt templates seeded into an empty database.
const DEFAULT_PROMPTS: &[(&str, &str, &str)] = &[
    (
        "标准分析",
        "请分析这个视频,并以JSON格式返回以下字段:video_serial_number(视频序列号,留空)、\
         video_content_summary(视频内容摘要,100字以内)、detailed_content_description\
         (详细内容描述)、keywords_tags(关键词标签,逗号分隔)、main_characters_objects\
         (主要人物和对象)、video_source_path(视频源路径,留空)。只返回JSON,不要其他内容。",
        "默认的六字段结构化分析",
    ),
    (
        "快速摘要",
        "请用两到三句话概括这个视频的主要内容,直接返回文本。",
        "只生成内容摘要",
    ),
    (
        "详细场景分析",
        "请按时间顺序详细描述视频中的每个场景,包括人物动作、环境、镜头切换和关键事件。",
        "逐场景的详细描述",
    ),
    (
        "关键词提取",
        "请从视频中提取10到20个关键词标签,用逗号分隔,涵盖主题、场景、人物、物体和情绪。",
        "只提取关键词标签",
    ),
    (
        "人物对象识别",
        "请列出视频中出现的所有主要人物和显著物体,并简要说明它们在视频中的作用。",
        "识别主要人物和对象",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_input() -> NewAnalysis {
        NewAnalysis {
            file_path: "/videos/beach.mp4".to_string(),
            file_name: "beach.mp4".to_string(),
            file_size: 1024,
            mime_type: Some("video/mp4".to_string()),
            analysis_prompt: "分析".to_string(),
            analysis_result: "{}".to_string(),
            content_summary: Some("海边散步".to_string()),
            keyword_tags: Some("海边,散步".to_string()),
            ..Default::default()
        }
    }

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_save_and_get() {
        let (_dir, db) = open_temp();
        let record = db.save_analysis(&sample_input()).unwrap();

        assert_eq!(record.sequence_id.len(), 22);
        assert_eq!(record.file_name, "beach.mp4");
        assert_eq!(record.table_sync_status, SyncState::Unsynced);

        let fetched = db.get(record.id).unwrap().unwrap();
        assert_eq!(fetched.sequence_id, record.sequence_id);

        let by_seq = db.get_by_sequence(&record.sequence_id).unwrap().unwrap();
        assert_eq!(by_seq.id, record.id);
    }

    #[test]
    fn test_list_newest_first() {
        let (_dir, db) = open_temp();
        for i in 0..3 {
            let mut input = sample_input();
            input.file_name = format!("clip-{i}.mp4");
            db.save_analysis(&input).unwrap();
        }

        let records = db.list(10, 0).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file_name, "clip-2.mp4");

        let page = db.list(2, 2).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(db.count().unwrap(), 3);
    }

    #[test]
    fn test_search_matches_tags() {
        let (_dir, db) = open_temp();
        db.save_analysis(&sample_input()).unwrap();

        assert_eq!(db.search("散步", 10).unwrap().len(), 1);
        assert_eq!(db.search("不存在", 10).unwrap().len(), 0);
    }

    #[test]
    fn test_delete_variants() {
        let (_dir, db) = open_temp();
        let a = db.save_analysis(&sample_input()).unwrap();
        let b = db.save_analysis(&sample_input()).unwrap();
        db.save_analysis(&sample_input()).unwrap();

        assert!(db.delete(a.id).unwrap());
        assert!(!db.delete(a.id).unwrap());
        assert_eq!(db.delete_many(&[b.id, 9999]).unwrap(), 1);
        assert_eq!(db.delete_all().unwrap(), 1);
    }

    #[test]
    fn test_sync_state_transitions() {
        let (_dir, db) = open_temp();
        let record = db.save_analysis(&sample_input()).unwrap();

        assert_eq!(db.unsynced(SyncSlot::Table).unwrap().len(), 1);

        db.set_table_record_id(record.id, Some("rec_abc")).unwrap();
        db.set_sync_state(record.id, SyncSlot::Table, SyncState::Synced)
            .unwrap();

        let updated = db.get(record.id).unwrap().unwrap();
        assert_eq!(updated.table_sync_status, SyncState::Synced);
        assert_eq!(updated.table_record_id.as_deref(), Some("rec_abc"));
        assert!(updated.table_sync_time.is_some());
        // Other destinations are untouched.
        assert_eq!(updated.sheet_sync_status, SyncState::Unsynced);
        assert!(db.unsynced(SyncSlot::Table).unwrap().is_empty());
        assert_eq!(db.unsynced(SyncSlot::Sheet).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_records_stay_unsynced() {
        let (_dir, db) = open_temp();
        let record = db.save_analysis(&sample_input()).unwrap();
        db.set_sync_state(record.id, SyncSlot::Doc, SyncState::Failed)
            .unwrap();
        assert_eq!(db.unsynced(SyncSlot::Doc).unwrap().len(), 1);
    }

    #[test]
    fn test_set_sync_state_missing_record() {
        let (_dir, db) = open_temp();
        let err = db
            .set_sync_state(42, SyncSlot::Table, SyncState::Synced)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_statistics() {
        let (_dir, db) = open_temp();
        let a = db.save_analysis(&sample_input()).unwrap();
        let b = db.save_analysis(&sample_input()).unwrap();
        db.set_sync_state(a.id, SyncSlot::Table, SyncState::Synced)
            .unwrap();
        db.set_sync_state(b.id, SyncSlot::Sheet, SyncState::Failed)
            .unwrap();

        let stats = db.statistics().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.table_synced, 1);
        assert_eq!(stats.sheet_failed, 1);
        assert_eq!(stats.doc_synced, 0);
    }

    #[test]
    fn test_prompts_seeded_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_prompts().unwrap().len(), 5);

        db.delete_prompt("快速摘要").unwrap();
        // Reopening must not re-seed into a non-empty table.
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_prompts().unwrap().len(), 4);
    }

    #[test]
    fn test_prompt_crud() {
        let (_dir, db) = open_temp();

        let prompt = db
            .add_prompt("剪辑素材", "提取适合剪辑的片段描述", Some("给剪辑师"))
            .unwrap();
        assert!(!prompt.is_default);

        let err = db.add_prompt("剪辑素材", "重复", None).unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePrompt(_)));

        let updated = db.update_prompt("剪辑素材", "新的内容", None).unwrap();
        assert_eq!(updated.prompt_text, "新的内容");

        assert!(db.delete_prompt("剪辑素材").unwrap());
        assert!(db.get_prompt("剪辑素材").unwrap().is_none());
    }
}
