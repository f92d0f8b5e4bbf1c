//! `virelya serve`: run the HTTP server until Ctrl-C.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use virelya::api::server::shutdown_signal;
use virelya::api::{start_server, AppState};
use virelya::backend;
use virelya::cache::SuggestionCache;
use virelya::config::Config;
use virelya::service::SuggestionService;

/// Build the cache, loading the snapshot when one is configured.
pub(crate) fn build_cache(config: &Config) -> Arc<SuggestionCache> {
    let cache = match &config.cache.snapshot_path {
        Some(path) => SuggestionCache::load_snapshot(path, config.cache.capacity),
        None => SuggestionCache::new(config.cache.capacity),
    };
    Arc::new(cache)
}

pub(crate) async fn cmd_serve(
    mut config: Config,
    port: Option<u16>,
    bind: Option<String>,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let cache = build_cache(&config);
    let backend = backend::from_config(&config.backend).context("failed to build backend")?;
    let service = Arc::new(SuggestionService::from_config(&config, cache, backend));

    info!(
        backend = service.backend_name(),
        cache_entries = service.cache().len(),
        cache_capacity = service.cache().capacity(),
        "Starting suggestion service"
    );

    let state = AppState::new(Arc::clone(&service)).with_api_token(config.server.api_token.clone());
    start_server(&config.server, state, shutdown_signal())
        .await
        .map_err(|e| anyhow!("server error: {e}"))?;

    service.emit_usage("shutdown");
    if let Some(path) = &config.cache.snapshot_path {
        match service.cache().save_snapshot(path) {
            Ok(()) => info!(path = %path.display(), "Cache snapshot saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save cache snapshot"),
        }
    }
    Ok(())
}
