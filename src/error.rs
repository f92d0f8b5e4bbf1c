//! Error types for the suggestion service.
//!
//! Every variant carries only owned strings or plain values so the error is
//! `Clone`: a single backend failure is handed to every caller waiting on the
//! same in-flight computation.

use std::time::Duration;

use thiserror::Error;

/// Service-wide error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VirelyaError {
    /// The request was malformed or exceeded a bound.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The generation backend was unreachable or returned an error.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The generation backend did not answer within the configured duration.
    #[error("backend timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Cache or registry invariant violation. Never shown verbatim to callers.
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),
}

impl VirelyaError {
    /// Short machine-readable kind, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
            Self::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for VirelyaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<std::io::Error> for VirelyaError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VirelyaError>;
