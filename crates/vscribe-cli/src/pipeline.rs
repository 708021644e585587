//! The analyze pipeline.
//!
//! validate -> (optional) mirror to object storage -> inference ->
//! parse and adapt -> persist -> (optional) push to destinations.
//!
//! Storage and destination pushes are best effort: a failed mirror or sync
//! never loses the analysis result, which is persisted first.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use vscribe_gemini::GeminiClient;
use vscribe_lark::LarkClient;
use vscribe_mapping::{CustomFieldMapper, FieldMappingConfig};
use vscribe_models::{AnalysisRecord, CanonicalField, NewAnalysis};
use vscribe_storage::StorageClient;
use vscribe_store::Database;
use vscribe_sync::{DocDestination, SheetDestination, SyncEngine, SyncMode, TableDestination};

use crate::config::AppConfig;
use crate::validator::validate_file;

/// Everything the commands need, wired once at startup.
pub struct App {
    pub config: AppConfig,
    pub db: Database,
    gemini: Option<GeminiClient>,
    storage: Option<StorageClient>,
    lark: Option<Arc<LarkClient>>,
    engine: Option<SyncEngine>,
}

impl App {
    /// Wire up clients from the environment. The inference and Lark clients
    /// are only required by the commands that use them, so a missing key
    /// fails late with a pointed message instead of blocking `history` or
    /// `prompt` commands.
    pub fn init(config: AppConfig) -> Result<Self> {
        let db = Database::open(&config.db_path)
            .with_context(|| format!("opening database {}", config.db_path.display()))?;

        let gemini = match GeminiClient::from_env() {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("inference client unavailable: {}", e);
                None
            }
        };

        let storage = if config.storage_enabled {
            Some(StorageClient::from_env().context("object storage is enabled but misconfigured")?)
        } else {
            None
        };

        let lark = if config.any_destination() {
            Some(Arc::new(LarkClient::from_env().context(
                "a Lark destination is enabled but LARK_APP_ID / LARK_APP_SECRET are not set",
            )?))
        } else {
            None
        };
        let engine = match &lark {
            Some(client) => Some(build_engine(&config, db.clone(), client.clone())?),
            None => None,
        };

        Ok(Self {
            config,
            db,
            gemini,
            storage,
            lark,
            engine,
        })
    }

    pub fn engine(&self) -> Option<&SyncEngine> {
        self.engine.as_ref()
    }

    pub fn storage(&self) -> Result<&StorageClient> {
        self.storage
            .as_ref()
            .context("object storage is not enabled; set S3_ENABLED=true in .env")
    }

    pub fn lark(&self) -> Result<&LarkClient> {
        self.lark
            .as_deref()
            .context("no Lark destination is enabled in .env")
    }

    fn gemini(&self) -> Result<&GeminiClient> {
        self.gemini
            .as_ref()
            .context("GEMINI_API_KEY is not set; run `vscribe setup` or edit .env")
    }

    /// Resolve the prompt text for an analysis.
    ///
    /// Precedence: inline `--prompt`, then `--prompt-name`, then the saved
    /// default prompt.
    pub fn resolve_prompt(
        &self,
        inline: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        if let Some(text) = inline {
            return Ok(text.to_string());
        }
        if let Some(name) = name {
            let prompt = self
                .db
                .get_prompt(name)?
                .with_context(|| format!("no saved prompt named '{name}'"))?;
            return Ok(prompt.prompt_text);
        }
        let prompts = self.db.list_prompts()?;
        prompts
            .iter()
            .find(|p| p.is_default)
            .or_else(|| prompts.first())
            .map(|p| p.prompt_text.clone())
            .context("no saved prompts; add one with `vscribe prompt add`")
    }

    /// Run the full pipeline for one file.
    pub async fn analyze(
        &self,
        path: &Path,
        prompt: &str,
        no_upload: bool,
        no_sync: bool,
    ) -> Result<AnalysisRecord> {
        let file = validate_file(path, &self.config)?;
        let gemini = self.gemini()?;

        // Mirror first so the stored record can carry the storage URL.
        let storage = if no_upload { None } else { self.storage.as_ref() };
        let mirrored = match storage {
            Some(storage) => match storage
                .upload_video(&file.path, self.config.storage_acl)
                .await
            {
                Ok(outcome) => {
                    info!(key = outcome.key, "mirrored to object storage");
                    Some(outcome)
                }
                Err(e) => {
                    warn!("storage mirror failed, continuing without it: {}", e);
                    None
                }
            },
            None => None,
        };

        info!(file = file.file_name, "starting analysis");
        let (result_text, remote) = gemini
            .analyze_video(&file.path, file.mime_type, prompt)
            .await
            .context("analysis failed")?;

        let output = vscribe_mapping::adapt(&vscribe_mapping::parse(&result_text));
        if !output.validation.empty.is_empty() {
            let empty: Vec<&str> = output.validation.empty.iter().map(|f| f.key()).collect();
            warn!(empty = empty.join(","), "result left some fields empty");
        }
        let fields = &output.fields;
        let non_empty = |f: CanonicalField| {
            let v = fields.get(f);
            (!v.is_empty()).then(|| v.to_string())
        };

        let record = self.db.save_analysis(&NewAnalysis {
            file_path: file.path.display().to_string(),
            file_name: file.file_name.clone(),
            file_size: file.size as i64,
            mime_type: Some(file.mime_type.to_string()),
            analysis_prompt: prompt.to_string(),
            analysis_result: result_text,
            inference_file_uri: Some(remote.uri),
            inference_file_name: Some(remote.name),
            storage_url: mirrored.as_ref().map(|m| m.url.clone()),
            storage_key: mirrored.as_ref().map(|m| m.key.clone()),
            content_summary: non_empty(CanonicalField::ContentSummary),
            detailed_description: non_empty(CanonicalField::DetailedDescription),
            keyword_tags: non_empty(CanonicalField::KeywordTags),
            main_objects: non_empty(CanonicalField::MainObjects),
        })?;
        info!(
            record_id = record.id,
            sequence_id = record.sequence_id,
            "analysis saved"
        );

        if !no_sync && self.config.auto_sync {
            if let Some(engine) = &self.engine {
                match engine.sync_record(record.id, SyncMode::Pending).await {
                    Ok(outcomes) => {
                        for (dest, outcome) in outcomes {
                            info!(destination = dest, "auto-sync: {:?}", outcome);
                        }
                    }
                    Err(e) => warn!("auto-sync failed: {}", e),
                }
                // Return the post-sync view.
                if let Some(fresh) = self.db.get(record.id)? {
                    return Ok(fresh);
                }
            }
        }

        Ok(record)
    }
}

/// Build the sync engine from whatever destinations are configured.
fn build_engine(config: &AppConfig, db: Database, client: Arc<LarkClient>) -> Result<SyncEngine> {
    let mut engine = SyncEngine::new(db);

    if let Some(table) = &config.table {
        // First run writes the default mapping file next to the database.
        let mapping = FieldMappingConfig::load_or_create(&config.mapping_path)
            .with_context(|| format!("loading {}", config.mapping_path.display()))?;
        let mapper = CustomFieldMapper::new(mapping)?;
        engine.register(Box::new(TableDestination::new(
            client.clone(),
            table.app_token.clone(),
            table.table_id.clone(),
            mapper,
        )));
    }
    if let Some(sheet) = &config.sheet {
        engine.register(Box::new(SheetDestination::new(
            client.clone(),
            sheet.spreadsheet_token.clone(),
            sheet.sheet_id.clone(),
        )));
    }
    if let Some(document_id) = &config.doc {
        engine.register(Box::new(DocDestination::new(
            client.clone(),
            document_id.clone(),
        )));
    }

    if engine.destination_names().is_empty() {
        bail!("destinations are enabled but none could be configured");
    }
    Ok(engine)
}
