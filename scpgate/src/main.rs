mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, default_value = "/etc/scpgate.yaml", env = "SCPGATE_CONFIG")]
    config: PathBuf,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the SCP server
    Run,
    /// Validate config file
    Check,
    /// Create a password hash for use in the password store
    Hash,
    /// Add a user to the password store or create a key store template
    CreateUser(commands::create_user::CreateUserArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(crate::config::configured_log_file(&cli.config).as_deref())?;

    match &cli.command {
        Commands::Run => crate::commands::run::command(&cli).await,
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::Hash => crate::commands::hash::command().await,
        Commands::CreateUser(args) => crate::commands::create_user::command(&cli, args).await,
    }
}
