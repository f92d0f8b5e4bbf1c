//! Command-line interface.

pub mod config;
pub mod serve;
pub mod suggest;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use virelya::config::LoggingConfig;

/// Next-line suggestions for short poems.
#[derive(Parser, Debug)]
#[command(name = "virelya", version, about)]
pub struct Cli {
    /// Config file (default: ~/.virelya/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, overrides the config file (e.g. "debug", "virelya=trace")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP suggestion server
    Serve {
        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
        /// Override the bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ask for suggestions once and print them
    Suggest {
        /// Context lines, oldest first
        #[arg(required = true)]
        lines: Vec<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration with secrets redacted
    Config,
}

/// Install the global tracing subscriber.
///
/// Precedence: `RUST_LOG`, then `--log-level`, then `logging.level`.
pub fn init_logging(config: &LoggingConfig, cli_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.unwrap_or(&config.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}
