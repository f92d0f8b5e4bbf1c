//! Mapping from [`VirelyaError`] to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::VirelyaError;

/// Message returned in place of internal details.
const INTERNAL_MESSAGE: &str = "internal server error";

/// HTTP status for each error kind.
pub fn status_code(err: &VirelyaError) -> StatusCode {
    match err {
        VirelyaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        VirelyaError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
        VirelyaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        VirelyaError::Internal(_) | VirelyaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Response body `{ "error": ... }` for `err`.
///
/// Internal and config errors are logged and replaced with a generic message.
pub fn error_message(err: &VirelyaError) -> String {
    match err {
        VirelyaError::Internal(_) | VirelyaError::Config(_) => {
            error!(error = %err, "Request failed with internal error");
            INTERNAL_MESSAGE.to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for VirelyaError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let message = error_message(&self);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_code(&VirelyaError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&VirelyaError::BackendUnavailable("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_code(&VirelyaError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_code(&VirelyaError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_hides_details() {
        let msg = error_message(&VirelyaError::Internal("lock table corrupted at 0x1f".into()));
        assert_eq!(msg, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_invalid_input_message_passes_through() {
        let msg = error_message(&VirelyaError::InvalidInput("too many lines".into()));
        assert!(msg.contains("too many lines"));
    }
}
