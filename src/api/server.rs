//! Axum API server.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::service::SuggestionService;

/// Request bodies are three short lines; anything near this size is abuse.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// The suggestion pipeline.
    pub service: Arc<SuggestionService>,
    /// Static bearer token for protected endpoints. `None` disables auth.
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(service: Arc<SuggestionService>) -> Self {
        Self {
            service,
            api_token: None,
        }
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
}

/// Build the axum router with all API routes.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/suggest-line", post(super::routes::suggest::suggest_line))
        .route("/health", get(super::routes::health::get_health))
        .route("/metrics", get(super::routes::metrics::get_metrics))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum_mw::from_fn_with_state(
            shared_state.clone(),
            super::middleware::auth_middleware,
        ))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn start_server<F>(
    config: &ServerConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(state, &config.cors_origins);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Suggestion server listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Suggestion server stopped");
    Ok(())
}
