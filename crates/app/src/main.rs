use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "abgleich")]
#[command(about = "Reconcile bank transactions with your budgeting ledger", version)]
struct Cli {
    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one sync: authenticate, confirm the challenge, review, import.
    Sync,
    /// Manage classification rules.
    Rules {
        #[command(subcommand)]
        cmd: RulesCmd,
    },
    /// Show recent sync sessions.
    History,
}

#[derive(Debug, Subcommand)]
enum RulesCmd {
    List,
    /// Print the ruleset as JSON.
    Export,
    /// Replace the ruleset from a JSON export (validates every rule first).
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load(&config_path)?;

    let data_dir = AppConfig::data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    let pool = abgleich_storage::create_db(&data_dir.join("abgleich.db")).await?;

    match cli.command {
        Command::Sync => commands::run_sync(&config, &pool).await,
        Command::Rules { cmd } => match cmd {
            RulesCmd::List => commands::list_rules(&pool).await,
            RulesCmd::Export => commands::export_rules(&pool).await,
            RulesCmd::Import { file } => commands::import_rules(&pool, &file).await,
        },
        Command::History => commands::history(&pool).await,
    }
}
