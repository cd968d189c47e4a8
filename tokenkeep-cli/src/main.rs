mod commands;
mod logging;
mod navigator;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use tokenkeep::{SessionManager, Settings};

use crate::commands::Command;
use crate::navigator::ConsoleNavigator;

#[derive(Debug, Parser)]
#[command(name = "tokenkeep", version, about = "Keep an API session alive from the terminal")]
struct Cli {
    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (log_path, _guard) = logging::init_logging(cli.verbose)?;
    tracing::debug!(log = %log_path.display(), "Logging initialized");

    let settings = Settings::new().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("\nCreate a tokenkeep.toml (or set TOKENKEEP_CONFIG) such as:");
        eprintln!("\nbase_url = \"https://api.example.com\"");
        eprintln!("refresh_path = \"/auth/refresh\"");
        e
    })?;
    tracing::info!(base_url = %settings.base_url, "Configuration loaded");

    let manager = SessionManager::from_settings(&settings, Arc::new(ConsoleNavigator::new()))?;

    commands::run(cli.command, &manager).await
}
