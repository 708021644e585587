//! VScribe command line binary.

mod args;
mod commands;
mod config;
mod pipeline;
mod validator;
mod watch;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Cli, Commands};
use config::AppConfig;
use pipeline::App;

#[tokio::main]
async fn main() {
    // Both ring (reqwest) and aws-lc (AWS SDK) end up in the dependency
    // graph, so rustls needs an explicit process-default provider.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vscribe=info,warn"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // The env wizard runs before any client wiring; it exists to create the
    // .env the rest of the commands read.
    if let Commands::Setup { command } = &cli.command {
        if matches!(command, args::SetupCommand::Env) {
            return commands::setup(None, command).await;
        }
    }

    let app = App::init(AppConfig::from_env()?)?;

    match cli.command {
        Commands::Analyze {
            files,
            prompt,
            prompt_name,
            no_upload,
            no_sync,
        } => {
            commands::analyze(
                &app,
                &files,
                prompt.as_deref(),
                prompt_name.as_deref(),
                no_upload,
                no_sync,
            )
            .await
        }
        Commands::Watch {
            dirs,
            prompt,
            prompt_name,
        } => commands::watch(&app, &dirs, prompt.as_deref(), prompt_name.as_deref()).await,
        Commands::Sync {
            destination,
            record,
            include_synced,
            force,
        } => {
            commands::sync(
                &app,
                destination.as_deref(),
                record.as_deref(),
                include_synced,
                force,
            )
            .await
        }
        Commands::History { command } => commands::history(&app, &command),
        Commands::Prompt { command } => commands::prompt(&app, &command),
        Commands::Setup { command } => commands::setup(Some(&app), &command).await,
        Commands::Storage { command } => commands::storage(&app, &command).await,
        Commands::Config { command } => commands::config(&app, &command),
    }
}
