//! Service counters and cache statistics.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::server::AppState;

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": state.service.metrics(),
        "cache": state.service.cache().stats(),
        "in_flight": state.service.in_flight(),
    }))
}
