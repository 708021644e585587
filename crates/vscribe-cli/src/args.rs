use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vscribe")]
#[command(about = "Analyze videos with Gemini and sync results to Lark", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log as JSON instead of plain text
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one or more video files, in order
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Inline prompt text
        #[arg(long, conflicts_with = "prompt_name")]
        prompt: Option<String>,

        /// Use a saved quick prompt by name
        #[arg(long)]
        prompt_name: Option<String>,

        /// Skip the object-storage mirror for this run
        #[arg(long)]
        no_upload: bool,

        /// Skip the automatic destination push
        #[arg(long)]
        no_sync: bool,
    },

    /// Watch directories and analyze new videos as they appear
    Watch {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        #[arg(long, conflicts_with = "prompt_name")]
        prompt: Option<String>,

        #[arg(long)]
        prompt_name: Option<String>,
    },

    /// Push stored records to configured destinations
    Sync {
        /// Only this destination (table, sheet, doc)
        #[arg(long)]
        destination: Option<String>,

        /// Only this record (numeric ID or sequence ID)
        #[arg(long)]
        record: Option<String>,

        /// Push already-synced records too, updating in place
        #[arg(long, conflicts_with = "force")]
        include_synced: bool,

        /// Drop remote references and re-create every record
        #[arg(long)]
        force: bool,
    },

    /// Browse analysis history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Manage saved quick prompts
    Prompt {
        #[command(subcommand)]
        command: PromptCommand,
    },

    /// Create destination structure or write credentials
    Setup {
        #[command(subcommand)]
        command: SetupCommand,
    },

    /// Inspect the object-storage mirror
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },

    /// Inspect or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum SetupCommand {
    /// Create any missing text fields in the bitable destination
    Table,

    /// Write the header row of the spreadsheet destination
    Sheet,

    /// Append a heading block to the document destination
    Doc,

    /// Interactive .env credential wizard
    Env,
}

#[derive(Subcommand)]
pub enum StorageCommand {
    /// List stored objects
    List {
        #[arg(long, default_value = "uploads/")]
        prefix: String,
    },

    /// Generate a temporary signed download URL
    Presign {
        key: String,

        #[arg(long, default_value = "3600")]
        expires_secs: u64,
    },

    /// Delete one stored object
    Delete {
        key: String,

        #[arg(long)]
        yes: bool,
    },

    /// Check bucket connectivity
    Check,
}

#[derive(Subcommand)]
pub enum HistoryCommand {
    List {
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    Show {
        /// Record ID or 22-character sequence ID
        id: String,
    },

    Search {
        keyword: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    Delete {
        ids: Vec<i64>,

        /// Delete every record
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    Stats,
}

#[derive(Subcommand)]
pub enum PromptCommand {
    List,

    Show {
        name: String,
    },

    Add {
        name: String,

        #[arg(long)]
        text: String,

        #[arg(long)]
        description: Option<String>,
    },

    Update {
        name: String,

        #[arg(long)]
        text: String,

        #[arg(long)]
        description: Option<String>,
    },

    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write one KEY=value into the .env file
    Set {
        key: String,
        value: String,
    },
}
