//! Lock-free counters for the suggestion service.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

/// Per-process request counters.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Total `suggest` calls.
    pub requests: AtomicU64,
    /// Requests rejected by validation.
    pub invalid_requests: AtomicU64,
    /// Requests answered from the cache.
    pub cache_hits: AtomicU64,
    /// Requests that started a new backend computation.
    pub cache_misses: AtomicU64,
    /// Requests that joined a computation already in flight.
    pub coalesced: AtomicU64,
    /// Backend invocations.
    pub backend_calls: AtomicU64,
    /// Backend invocations that failed (timeouts included).
    pub backend_errors: AtomicU64,
    /// Backend invocations cut off by the timeout.
    pub timeouts: AtomicU64,
}

/// Point-in-time copy of [`ServiceMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub invalid_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub coalesced: u64,
    pub backend_calls: u64,
    pub backend_errors: u64,
    pub timeouts: u64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Emit current counters as a structured log line.
    pub fn emit_usage(&self, reason: &str) {
        let s = self.snapshot();
        info!(
            event = "usage_summary",
            reason = reason,
            requests = s.requests,
            cache_hits = s.cache_hits,
            cache_misses = s.cache_misses,
            coalesced = s.coalesced,
            backend_calls = s.backend_calls,
            backend_errors = s.backend_errors,
            timeouts = s.timeouts,
            "Usage metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_bumps() {
        let m = ServiceMetrics::new();
        ServiceMetrics::bump(&m.requests);
        ServiceMetrics::bump(&m.requests);
        ServiceMetrics::bump(&m.cache_hits);
        let s = m.snapshot();
        assert_eq!(s.requests, 2);
        assert_eq!(s.cache_hits, 1);
        assert_eq!(s.backend_calls, 0);
    }
}
