//! `POST /suggest-line`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::api::server::AppState;
use crate::config::MAX_SUGGESTIONS;

/// Inbound body: the poem lines typed so far.
#[derive(Debug, Deserialize)]
pub struct SuggestLineRequest {
    pub lines: Vec<String>,
    /// How many suggestions the client wants, clamped to 1..=5. The service
    /// generates its configured count; this only narrows the response.
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl SuggestLineRequest {
    fn limit(&self) -> usize {
        self.top_k.map_or(MAX_SUGGESTIONS, |k| k.clamp(1, MAX_SUGGESTIONS))
    }
}

/// Outbound body on success.
#[derive(Debug, Serialize)]
pub struct SuggestLineResponse {
    pub suggestions: Vec<String>,
}

pub async fn suggest_line(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SuggestLineRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return (status, Json(json!({ "error": rejection.body_text() }))).into_response();
        }
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("suggest_line", %request_id, lines = request.lines.len());
    let limit = request.limit();

    async move {
        match state.service.suggest(&request.lines).await {
            Ok(result) => {
                debug!(
                    suggestions = result.suggestions.len(),
                    backend = %result.backend,
                    "Suggestions ready"
                );
                Json(SuggestLineResponse {
                    suggestions: result.suggestions.iter().take(limit).cloned().collect(),
                })
                .into_response()
            }
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::tests::state_with;

    #[tokio::test]
    async fn test_handler_direct_call() {
        let state = State(Arc::new(state_with(Ok(vec!["next".into()]))));
        let resp = suggest_line(
            state,
            Ok(Json(SuggestLineRequest {
                lines: vec!["first".into()],
                top_k: None,
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_lines_is_400() {
        let state = State(Arc::new(state_with(Ok(vec!["next".into()]))));
        let resp = suggest_line(
            state,
            Ok(Json(SuggestLineRequest {
                lines: vec![],
                top_k: None,
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_top_k_limit_clamped() {
        let req = |top_k| SuggestLineRequest {
            lines: vec![],
            top_k,
        };
        assert_eq!(req(None).limit(), MAX_SUGGESTIONS);
        assert_eq!(req(Some(0)).limit(), 1);
        assert_eq!(req(Some(2)).limit(), 2);
        assert_eq!(req(Some(50)).limit(), MAX_SUGGESTIONS);
    }
}
