//! Command handlers.

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use vscribe_lark::FIELD_TYPE_TEXT;
use vscribe_models::AnalysisRecord;
use vscribe_sync::{PushOutcome, SyncMode};

use crate::args::{ConfigCommand, HistoryCommand, PromptCommand, SetupCommand, StorageCommand};
use crate::config::update_env_file;
use crate::pipeline::App;
use crate::watch::watch_directories;

/// Pause between files in a batch analysis, to space out inference calls.
const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Header row of the spreadsheet destination, columns A through I.
/// Must stay in step with the row layout the sheet destination writes.
const SHEET_HEADERS: [&str; 9] = [
    "视频序列号",
    "文件名",
    "内容摘要",
    "详细描述",
    "关键词标签",
    "主要对象",
    "分析时间",
    "同步时间",
    "同步状态",
];

pub async fn analyze(
    app: &App,
    files: &[PathBuf],
    prompt: Option<&str>,
    prompt_name: Option<&str>,
    no_upload: bool,
    no_sync: bool,
) -> Result<()> {
    let prompt = app.resolve_prompt(prompt, prompt_name)?;

    let mut failures = 0usize;
    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(BATCH_DELAY).await;
        }
        // Invalid or failing files are reported and skipped, not fatal.
        match app.analyze(file, &prompt, no_upload, no_sync).await {
            Ok(record) => print_record(&record),
            Err(e) => {
                failures += 1;
                eprintln!("Skipping {}: {e:#}", file.display());
            }
        }
    }

    if failures == files.len() {
        bail!("all {} file(s) failed", failures);
    }
    if failures > 0 {
        println!("{} of {} file(s) failed.", failures, files.len());
    }
    Ok(())
}

pub async fn watch(
    app: &App,
    dirs: &[PathBuf],
    prompt: Option<&str>,
    prompt_name: Option<&str>,
) -> Result<()> {
    let prompt = app.resolve_prompt(prompt, prompt_name)?;
    println!("Watching (Ctrl-C to stop)");

    watch_directories(dirs, &app.config, |path| {
        let prompt = prompt.clone();
        async move {
            match app.analyze(&path, &prompt, false, false).await {
                Ok(record) => {
                    println!("Analyzed {} -> #{}", path.display(), record.id);
                }
                Err(e) => eprintln!("Failed to analyze {}: {e:#}", path.display()),
            }
        }
    })
    .await
}

pub async fn sync(
    app: &App,
    destination: Option<&str>,
    record: Option<&str>,
    include_synced: bool,
    force: bool,
) -> Result<()> {
    let engine = app
        .engine()
        .context("no destinations configured; enable one in .env")?;
    let mode = if force {
        SyncMode::Force
    } else if include_synced {
        SyncMode::IncludeSynced
    } else {
        SyncMode::Pending
    };

    if let Some(id) = record {
        let record = find_record(app, id)?;
        let outcomes = engine.sync_record(record.id, mode).await?;
        for (dest, outcome) in outcomes {
            match outcome {
                PushOutcome::Failed(msg) => println!("{dest}: failed ({msg})"),
                other => println!("{dest}: {other:?}"),
            }
        }
        return Ok(());
    }

    let reports = match destination {
        Some(name) => vec![engine.sync_destination(name, mode).await?],
        None => engine.sync_all(mode).await?,
    };
    for report in reports {
        println!(
            "{}: {} total, {} created, {} updated, {} skipped, {} failed",
            report.destination,
            report.total,
            report.created,
            report.updated,
            report.skipped,
            report.failed
        );
    }
    Ok(())
}

pub fn history(app: &App, command: &HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { limit, offset } => {
            let records = app.db.list(*limit, *offset)?;
            if records.is_empty() {
                println!("No records.");
                return Ok(());
            }
            for record in &records {
                println!(
                    "#{:<5} {}  {:<30} table:{} sheet:{} doc:{}",
                    record.id,
                    record
                        .created_at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M"),
                    record.file_name,
                    record.table_sync_status,
                    record.sheet_sync_status,
                    record.doc_sync_status
                );
            }
            println!("{} of {} records", records.len(), app.db.count()?);
        }
        HistoryCommand::Show { id } => {
            let record = find_record(app, id)?;
            print_record(&record);
            println!("\n--- raw result ---\n{}", record.analysis_result);
        }
        HistoryCommand::Search { keyword, limit } => {
            let records = app.db.search(keyword, *limit)?;
            if records.is_empty() {
                println!("No matches for '{keyword}'.");
                return Ok(());
            }
            for record in &records {
                println!(
                    "#{:<5} {:<30} {}",
                    record.id,
                    record.file_name,
                    record.content_summary.as_deref().unwrap_or("")
                );
            }
        }
        HistoryCommand::Delete { ids, all, yes } => {
            if *all {
                let total = app.db.count()?;
                if total == 0 {
                    println!("Nothing to delete.");
                    return Ok(());
                }
                if !*yes && !confirm(&format!("Delete all {total} records?"))? {
                    println!("Cancelled.");
                    return Ok(());
                }
                let deleted = app.db.delete_all()?;
                println!("Deleted {deleted} records.");
            } else {
                if ids.is_empty() {
                    bail!("pass record IDs or --all");
                }
                if !*yes && !confirm(&format!("Delete {} record(s)?", ids.len()))? {
                    println!("Cancelled.");
                    return Ok(());
                }
                let deleted = app.db.delete_many(ids)?;
                println!("Deleted {deleted} records.");
            }
        }
        HistoryCommand::Stats => {
            let stats = app.db.statistics()?;
            println!("Total records: {}", stats.total);
            println!(
                "Table: {} synced, {} failed",
                stats.table_synced, stats.table_failed
            );
            println!(
                "Sheet: {} synced, {} failed",
                stats.sheet_synced, stats.sheet_failed
            );
            println!(
                "Doc:   {} synced, {} failed",
                stats.doc_synced, stats.doc_failed
            );
        }
    }
    Ok(())
}

pub fn prompt(app: &App, command: &PromptCommand) -> Result<()> {
    match command {
        PromptCommand::List => {
            for p in app.db.list_prompts()? {
                let marker = if p.is_default { "*" } else { " " };
                println!(
                    "{marker} {:<20} {}",
                    p.name,
                    p.description.as_deref().unwrap_or("")
                );
            }
        }
        PromptCommand::Show { name } => {
            let p = app
                .db
                .get_prompt(name)?
                .with_context(|| format!("no prompt named '{name}'"))?;
            println!("{}\n\n{}", p.name, p.prompt_text);
        }
        PromptCommand::Add {
            name,
            text,
            description,
        } => {
            app.db.add_prompt(name, text, description.as_deref())?;
            println!("Added prompt '{name}'.");
        }
        PromptCommand::Update {
            name,
            text,
            description,
        } => {
            app.db.update_prompt(name, text, description.as_deref())?;
            println!("Updated prompt '{name}'.");
        }
        PromptCommand::Delete { name } => {
            if app.db.delete_prompt(name)? {
                println!("Deleted prompt '{name}'.");
            } else {
                bail!("no prompt named '{name}'");
            }
        }
    }
    Ok(())
}

pub async fn setup(app: Option<&App>, command: &SetupCommand) -> Result<()> {
    match command {
        SetupCommand::Env => setup_env(),
        SetupCommand::Table => setup_table(required(app)?).await,
        SetupCommand::Sheet => setup_sheet(required(app)?).await,
        SetupCommand::Doc => setup_doc(required(app)?).await,
    }
}

fn required(app: Option<&App>) -> Result<&App> {
    app.context("configuration did not load; run `vscribe setup env` first")
}

/// Create any destination fields the mapping config names that the remote
/// table does not have yet. Existing fields are left untouched.
async fn setup_table(app: &App) -> Result<()> {
    let table = app
        .config
        .table
        .as_ref()
        .context("the table destination is not enabled")?;
    let client = app.lark()?;

    let mapping = vscribe_mapping::FieldMappingConfig::load_or_create(&app.config.mapping_path)?;
    let existing = client
        .bitable_list_fields(&table.app_token, &table.table_id)
        .await?;

    let mut created = 0;
    for name in mapping.destination_fields.keys() {
        if existing.iter().any(|f| f == name) {
            continue;
        }
        client
            .bitable_create_field(&table.app_token, &table.table_id, name, FIELD_TYPE_TEXT)
            .await?;
        println!("Created field {name}");
        created += 1;
    }
    println!("Table ready ({created} field(s) created).");
    Ok(())
}

/// Write the header row. Overwrites whatever is in row 1.
async fn setup_sheet(app: &App) -> Result<()> {
    let sheet = app
        .config
        .sheet
        .as_ref()
        .context("the spreadsheet destination is not enabled")?;
    let client = app.lark()?;

    let range = format!("{}!A1:I1", sheet.sheet_id);
    let header = SHEET_HEADERS
        .iter()
        .map(|h| serde_json::Value::String(h.to_string()))
        .collect();
    client
        .sheet_write_values(&sheet.spreadsheet_token, &range, vec![header])
        .await?;
    println!("Sheet header written.");
    Ok(())
}

/// Append a heading block so pushed records have a titled section.
async fn setup_doc(app: &App) -> Result<()> {
    let document_id = app
        .config
        .doc
        .as_ref()
        .context("the document destination is not enabled")?;
    let client = app.lark()?;

    client
        .doc_append_paragraphs(document_id, &["视频分析记录".to_string()])
        .await?;
    println!("Document heading appended.");
    Ok(())
}

/// Minimal first-run wizard: asks for the keys the pipeline needs and
/// writes them into `.env`, leaving existing entries alone.
fn setup_env() -> Result<()> {
    println!("VScribe setup. Press Enter to keep the current value.\n");

    let entries = [
        ("GEMINI_API_KEY", "Gemini API key"),
        ("LARK_APP_ID", "Lark app ID (blank to skip Lark)"),
        ("LARK_APP_SECRET", "Lark app secret"),
        ("LARK_BITABLE_APP_TOKEN", "Bitable app token"),
        ("LARK_TABLE_ID", "Bitable table ID"),
    ];

    for (key, label) in entries {
        let current = std::env::var(key).ok();
        let hint = match &current {
            Some(v) if v.len() > 4 => format!(" [{}…]", &v[..4]),
            Some(_) => " [set]".to_string(),
            None => String::new(),
        };
        let value = ask(&format!("{label}{hint}: "))?;
        if !value.is_empty() {
            update_env_file(".env", key, &value)?;
        }
    }

    if ask("Enable the bitable destination? [y/N] ")?.eq_ignore_ascii_case("y") {
        update_env_file(".env", "LARK_TABLE_ENABLED", "true")?;
    }

    println!("\nSaved. Run `vscribe analyze <file>` to try it out.");
    Ok(())
}

pub async fn storage(app: &App, command: &StorageCommand) -> Result<()> {
    let storage = app.storage()?;
    match command {
        StorageCommand::List { prefix } => {
            let objects = storage.list_objects(prefix).await?;
            if objects.is_empty() {
                println!("No objects under '{prefix}'.");
                return Ok(());
            }
            for obj in &objects {
                println!("{:>12}  {}", obj.size, obj.key);
            }
            println!("{} object(s)", objects.len());
        }
        StorageCommand::Presign { key, expires_secs } => {
            let url = storage
                .presign_get(key, Duration::from_secs(*expires_secs))
                .await?;
            println!("{url}");
        }
        StorageCommand::Delete { key, yes } => {
            if !*yes && !confirm(&format!("Delete {key}?"))? {
                println!("Cancelled.");
                return Ok(());
            }
            storage.delete_object(key).await?;
            println!("Deleted {key}.");
        }
        StorageCommand::Check => {
            storage.check_connectivity().await?;
            println!("Bucket reachable.");
        }
    }
    Ok(())
}

pub fn config(app: &App, command: &ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let c = &app.config;
            println!("db_path            {}", c.db_path.display());
            println!("mapping_path       {}", c.mapping_path.display());
            println!("max_file_size_mb   {}", c.max_file_size_mb);
            println!("supported_formats  {}", c.supported_formats.join(","));
            println!("storage_enabled    {}", c.storage_enabled);
            println!("auto_sync          {}", c.auto_sync);
            println!("watch_debounce     {}s", c.watch_debounce_secs);
            println!("table destination  {}", c.table.is_some());
            println!("sheet destination  {}", c.sheet.is_some());
            println!("doc destination    {}", c.doc.is_some());
        }
        ConfigCommand::Set { key, value } => {
            update_env_file(".env", key, value)?;
            println!("Set {key} in .env (takes effect on next run).");
        }
    }
    Ok(())
}

fn find_record(app: &App, id: &str) -> Result<AnalysisRecord> {
    let record = match id.parse::<i64>() {
        Ok(numeric) => app.db.get(numeric)?,
        Err(_) => app.db.get_by_sequence(id)?,
    };
    record.with_context(|| format!("no record '{id}'"))
}

fn print_record(record: &AnalysisRecord) {
    println!("Record #{} ({})", record.id, record.sequence_id);
    println!("  file      {} ({} bytes)", record.file_name, record.file_size);
    if let Some(url) = &record.storage_url {
        println!("  storage   {url}");
    }
    if let Some(summary) = &record.content_summary {
        println!("  summary   {summary}");
    }
    if let Some(tags) = &record.keyword_tags {
        println!("  tags      {tags}");
    }
    if let Some(objects) = &record.main_objects {
        println!("  objects   {objects}");
    }
    println!(
        "  sync      table:{} sheet:{} doc:{}",
        record.table_sync_status, record.sheet_sync_status, record.doc_sync_status
    );
}

fn confirm(question: &str) -> Result<bool> {
    Ok(ask(&format!("{question} [y/N] "))?.eq_ignore_ascii_case("y"))
}

fn ask(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
