//! Generation backends.
//!
//! A [`GenerationBackend`] turns up to a few context lines into candidate next
//! lines. Two implementations ship: [`RemoteBackend`] calls an HTTP generation
//! provider, [`LocalBackend`] runs a small in-process model. The variant is
//! chosen once at startup by [`from_config`].

pub mod corpus;
pub mod local;
pub mod remote;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{BackendConfig, BackendKind};
use crate::error::Result;

pub use corpus::{Corpus, Poem};
pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// Capability: produce up to `count` candidate next lines for `lines`.
///
/// Implementations return between 0 and `count` suggestions, each non-empty
/// and distinct. Network or model failures surface as
/// [`VirelyaError::BackendUnavailable`](crate::error::VirelyaError::BackendUnavailable).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, lines: &[String], count: usize) -> Result<Vec<String>>;

    /// Short identifier reported alongside results.
    fn name(&self) -> &'static str;
}

/// Reduce raw generated texts to clean suggestions.
///
/// Keeps only the first line of each text, trims it, drops empties and
/// duplicates (first occurrence wins) and caps the result at `count`.
pub fn clean_candidates<I, S>(raw: I, count: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(count);
    for text in raw {
        if out.len() >= count {
            break;
        }
        let line = text.as_ref().trim().lines().next().unwrap_or("").trim();
        if !line.is_empty() && seen.insert(line.to_string()) {
            out.push(line.to_string());
        }
    }
    out
}

/// Build the configured backend.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn GenerationBackend>> {
    let backend: Arc<dyn GenerationBackend> = match config.kind {
        BackendKind::Local => Arc::new(LocalBackend::from_config(&config.local)?),
        BackendKind::Remote => Arc::new(RemoteBackend::from_config(
            &config.remote,
            config.timeout(),
        )?),
    };
    info!(backend = backend.name(), "Generation backend ready");
    Ok(backend)
}
