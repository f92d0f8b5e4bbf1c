//! Result types shared by the cache, the service and the API layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionResult {
    /// Candidate next lines, at most five, deduplicated and non-empty.
    pub suggestions: Vec<String>,
    /// Wall time of the backend call that produced this result.
    pub latency: Duration,
    /// Name of the backend that produced this result.
    pub backend: String,
}

impl SuggestionResult {
    pub fn new(suggestions: Vec<String>, latency: Duration, backend: impl Into<String>) -> Self {
        Self {
            suggestions,
            latency,
            backend: backend.into(),
        }
    }
}
