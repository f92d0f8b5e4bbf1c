//! `virelya suggest`: one-shot suggestions through the full pipeline.

use anyhow::{Context, Result};

use virelya::backend;
use virelya::config::Config;
use virelya::service::SuggestionService;

use super::serve::build_cache;

pub(crate) async fn cmd_suggest(config: Config, lines: Vec<String>, json: bool) -> Result<()> {
    let backend = backend::from_config(&config.backend).context("failed to build backend")?;
    let service = SuggestionService::from_config(&config, build_cache(&config), backend);

    let result = service
        .suggest(&lines)
        .await
        .context("suggestion request failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*result)?);
        return Ok(());
    }

    if result.suggestions.is_empty() {
        println!("No suggestions.");
    }
    for (i, s) in result.suggestions.iter().enumerate() {
        println!("{}. {}", i + 1, s);
    }
    Ok(())
}
