//! Suggestion caching with LRU eviction and optional snapshot persistence.

pub mod suggestion_cache;

pub use suggestion_cache::{CacheStats, Fingerprint, SuggestionCache};
