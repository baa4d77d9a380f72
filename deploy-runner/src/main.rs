use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands};

mod args;
mod commands;
mod prompts;
mod summary;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match &cli.command {
        Commands::InstallConfig(args) => commands::install_config::run(args, &cli).await,
        Commands::Provision(args) => commands::provision::run(args, &cli).await,
        Commands::Destroy => commands::destroy::run(&cli).await,
        Commands::Ls => commands::ls::run(&cli).await,
    }
}
