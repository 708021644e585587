//! Schema creation and in-place upgrades.
//!
//! The schema is created with `CREATE TABLE IF NOT EXISTS` and upgraded by
//! probing `PRAGMA table_info` for columns added after the first release,
//! so an old database file keeps its data across upgrades. Dropping or
//! retyping a column is not supported.

use rusqlite::Connection;

use crate::error::StoreResult;

pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS video_analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sequence_id TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            mime_type TEXT,
            analysis_prompt TEXT NOT NULL,
            analysis_result TEXT NOT NULL,
            inference_file_uri TEXT,
            inference_file_name TEXT,
            content_summary TEXT,
            detailed_description TEXT,
            keyword_tags TEXT,
            main_objects TEXT,
            table_record_id TEXT,
            table_sync_status INTEGER NOT NULL DEFAULT 0,
            table_sync_time TEXT,
            sheet_sync_status INTEGER NOT NULL DEFAULT 0,
            sheet_sync_time TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quick_prompts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            prompt_text TEXT NOT NULL,
            description TEXT,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_analysis_sequence ON video_analysis(sequence_id);
        CREATE INDEX IF NOT EXISTS idx_analysis_created ON video_analysis(created_at DESC);
        "#,
    )?;

    // Columns added after the first release.
    add_column_if_missing(conn, "video_analysis", "storage_url", "TEXT")?;
    add_column_if_missing(conn, "video_analysis", "storage_key", "TEXT")?;
    add_column_if_missing(conn, "video_analysis", "sheet_row", "INTEGER")?;
    add_column_if_missing(
        conn,
        "video_analysis",
        "doc_sync_status",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    add_column_if_missing(conn, "video_analysis", "doc_sync_time", "TEXT")?;

    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> StoreResult<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .any(|name| name == column);

    if !exists {
        conn.execute(
            &format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"),
            [],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_upgrade_adds_missing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        // A pre-upgrade table without the storage and doc columns.
        conn.execute_batch(
            r#"
            CREATE TABLE video_analysis (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sequence_id TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL DEFAULT 0,
                mime_type TEXT,
                analysis_prompt TEXT NOT NULL,
                analysis_result TEXT NOT NULL,
                inference_file_uri TEXT,
                inference_file_name TEXT,
                content_summary TEXT,
                detailed_description TEXT,
                keyword_tags TEXT,
                main_objects TEXT,
                table_record_id TEXT,
                table_sync_status INTEGER NOT NULL DEFAULT 0,
                table_sync_time TEXT,
                sheet_sync_status INTEGER NOT NULL DEFAULT 0,
                sheet_sync_time TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .unwrap();

        init_schema(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(video_analysis)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(columns.contains(&"storage_url".to_string()));
        assert!(columns.contains(&"doc_sync_status".to_string()));
        assert!(columns.contains(&"sheet_row".to_string()));
    }
}
