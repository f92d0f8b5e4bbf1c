//! Virelya CLI entry point.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use virelya::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    cli::init_logging(&config.logging, args.log_level.as_deref());

    match args.command {
        Commands::Serve { port, bind } => cli::serve::cmd_serve(config, port, bind).await,
        Commands::Suggest { lines, json } => cli::suggest::cmd_suggest(config, lines, json).await,
        Commands::Config => cli::config::cmd_config(&config),
    }
}
