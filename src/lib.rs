//! Virelya: next-line suggestions for short poems.
//!
//! Requests flow through [`service::SuggestionService`]: the lines are
//! validated and normalized, fingerprinted, looked up in the
//! [`cache::SuggestionCache`], and on a miss handed to a
//! [`backend::GenerationBackend`] with at most one call in flight per
//! fingerprint. [`api`] exposes the service over HTTP.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod types;
pub mod validate;

pub use error::{Result, VirelyaError};
pub use service::SuggestionService;
pub use types::SuggestionResult;
