//! `virelya config`: print the effective configuration.

use anyhow::Result;

use virelya::config::Config;

pub(crate) fn cmd_config(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.redacted_json()?)?);
    Ok(())
}
