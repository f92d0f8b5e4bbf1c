//! Suggestion orchestration: validate, consult the cache, generate once.
//!
//! Concurrent requests with the same fingerprint share one backend call. The
//! first caller registers a [`Shared`] future in the in-flight table; later
//! callers clone it. The computation runs on its own task under the configured
//! timeout, stores successes in the cache, then removes itself from the table.
//! Every waiter observes the same outcome and failures are never cached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, warn};

use crate::backend::{clean_candidates, GenerationBackend};
use crate::cache::{Fingerprint, SuggestionCache};
use crate::config::{Config, MAX_SUGGESTIONS};
use crate::error::{Result, VirelyaError};
use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::types::SuggestionResult;
use crate::validate::{RequestValidator, SuggestionRequest};

type PendingResult = Shared<BoxFuture<'static, Result<Arc<SuggestionResult>>>>;
type Table = HashMap<Fingerprint, PendingResult>;

fn lock_table(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(|p| p.into_inner())
}

/// Orchestrates validation, caching and de-duplicated generation.
pub struct SuggestionService {
    validator: RequestValidator,
    cache: Arc<SuggestionCache>,
    backend: Arc<dyn GenerationBackend>,
    in_flight: Arc<Mutex<Table>>,
    timeout: Duration,
    count: usize,
    metrics: Arc<ServiceMetrics>,
}

impl SuggestionService {
    pub fn new(
        validator: RequestValidator,
        cache: Arc<SuggestionCache>,
        backend: Arc<dyn GenerationBackend>,
        timeout: Duration,
        count: usize,
    ) -> Self {
        Self {
            validator,
            cache,
            backend,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            count: count.clamp(1, MAX_SUGGESTIONS),
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Wire a service from config around an already-built cache and backend.
    pub fn from_config(
        config: &Config,
        cache: Arc<SuggestionCache>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self::new(
            RequestValidator::new(config.limits.clone()),
            cache,
            backend,
            config.backend.timeout(),
            config.backend.effective_count(),
        )
    }

    /// Produce suggestions for `raw_lines`.
    pub async fn suggest(&self, raw_lines: &[String]) -> Result<Arc<SuggestionResult>> {
        ServiceMetrics::bump(&self.metrics.requests);

        let request = self.validator.validate(raw_lines).inspect_err(|_| {
            ServiceMetrics::bump(&self.metrics.invalid_requests);
        })?;
        let fingerprint = Fingerprint::of(&request);

        if let Some(hit) = self.cache.lookup(&fingerprint) {
            debug!(fingerprint = %fingerprint.short(), "Cache hit");
            ServiceMetrics::bump(&self.metrics.cache_hits);
            return Ok(hit);
        }

        let pending = {
            let mut table = lock_table(&self.in_flight);
            // A computation may have finished between the lookup above and
            // taking the lock; it stores before it deregisters.
            if let Some(hit) = self.cache.lookup(&fingerprint) {
                ServiceMetrics::bump(&self.metrics.cache_hits);
                return Ok(hit);
            }
            match table.get(&fingerprint) {
                Some(existing) => {
                    debug!(fingerprint = %fingerprint.short(), "Joining in-flight generation");
                    ServiceMetrics::bump(&self.metrics.coalesced);
                    existing.clone()
                }
                None => {
                    ServiceMetrics::bump(&self.metrics.cache_misses);
                    let pending = self.spawn_generation(fingerprint.clone(), request);
                    table.insert(fingerprint, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Start the backend call on its own task and return a shareable handle.
    ///
    /// Must be called with the in-flight table locked so the task cannot
    /// deregister before it is registered.
    fn spawn_generation(
        &self,
        fingerprint: Fingerprint,
        request: SuggestionRequest,
    ) -> PendingResult {
        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let metrics = Arc::clone(&self.metrics);
        let timeout = self.timeout;
        let count = self.count;
        let fingerprint_for_cleanup = fingerprint.clone();

        let task = tokio::spawn(async move {
            ServiceMetrics::bump(&metrics.backend_calls);
            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(timeout, backend.generate(request.lines(), count)).await {
                    Ok(Ok(raw)) => Ok(Arc::new(SuggestionResult::new(
                        clean_candidates(raw, count),
                        started.elapsed(),
                        backend.name(),
                    ))),
                    Ok(Err(e)) => Err(e),
                    Err(_) => {
                        ServiceMetrics::bump(&metrics.timeouts);
                        Err(VirelyaError::Timeout(timeout))
                    }
                };

            match &outcome {
                Ok(result) => {
                    debug!(
                        fingerprint = %fingerprint.short(),
                        suggestions = result.suggestions.len(),
                        latency_ms = result.latency.as_millis() as u64,
                        "Generated suggestions"
                    );
                    cache.store(fingerprint.clone(), Arc::clone(result));
                }
                Err(e) => {
                    ServiceMetrics::bump(&metrics.backend_errors);
                    warn!(
                        fingerprint = %fingerprint.short(),
                        backend = backend.name(),
                        kind = e.kind(),
                        error = %e,
                        "Generation failed"
                    );
                }
            }

            lock_table(&in_flight).remove(&fingerprint);
            outcome
        });

        let registry = Arc::clone(&self.in_flight);
        let key = fingerprint_for_cleanup;
        async move {
            task.await.unwrap_or_else(|e| {
                // The task died before deregistering itself.
                lock_table(&registry).remove(&key);
                error!(error = %e, "Generation task aborted");
                Err(VirelyaError::Internal(format!("generation task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    pub fn cache(&self) -> &Arc<SuggestionCache> {
        &self.cache
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Log the counters; called on shutdown.
    pub fn emit_usage(&self, reason: &str) {
        self.metrics.emit_usage(reason);
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        lock_table(&self.in_flight).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockGenerationBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that counts calls and answers after an optional delay.
    struct StubBackend {
        calls: AtomicUsize,
        delay: Duration,
        reply: Result<Vec<String>>,
    }

    impl StubBackend {
        fn new(reply: Result<Vec<String>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                reply,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationBackend for StubBackend {
        async fn generate(&self, _lines: &[String], _count: usize) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn service(backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Arc<SuggestionService> {
        Arc::new(SuggestionService::new(
            RequestValidator::default(),
            Arc::new(SuggestionCache::new(16)),
            backend,
            timeout,
            3,
        ))
    }

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_moon_example() {
        let backend = StubBackend::new(Ok(lines(&["over silver hills"])), Duration::ZERO);
        let svc = service(backend.clone(), Duration::from_secs(10));
        let result = svc.suggest(&lines(&["The moon hangs low"])).await.unwrap();
        assert_eq!(result.suggestions, vec!["over silver hills"]);
        assert_eq!(result.backend, "stub");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_backend() {
        let backend = StubBackend::new(Ok(vec![]), Duration::ZERO);
        let svc = service(backend.clone(), Duration::from_secs(10));
        let err = svc.suggest(&lines(&["a", "b", "c", "d"])).await.unwrap_err();
        assert!(matches!(err, VirelyaError::InvalidInput(_)));
        assert_eq!(backend.calls(), 0);
        assert_eq!(svc.metrics().invalid_requests, 1);
    }

    #[tokio::test]
    async fn test_repeated_requests_hit_cache() {
        let backend = StubBackend::new(Ok(lines(&["x"])), Duration::ZERO);
        let svc = service(backend.clone(), Duration::from_secs(10));
        let first = svc.suggest(&lines(&["same"])).await.unwrap();
        for _ in 0..5 {
            let again = svc.suggest(&lines(&["same"])).await.unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(backend.calls(), 1);
        assert_eq!(svc.metrics().cache_hits, 5);
    }

    #[tokio::test]
    async fn test_normalization_shares_cache_entry() {
        let backend = StubBackend::new(Ok(lines(&["x"])), Duration::ZERO);
        let svc = service(backend.clone(), Duration::from_secs(10));
        svc.suggest(&lines(&["roses  ", ""])).await.unwrap();
        svc.suggest(&lines(&["roses"])).await.unwrap();
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ten_concurrent_identical_requests_one_backend_call() {
        let backend = StubBackend::new(Ok(lines(&["shared"])), Duration::from_millis(100));
        let svc = service(backend.clone(), Duration::from_secs(10));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.suggest(&lines(&["The moon hangs low"])).await })
            })
            .collect();

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap().unwrap());
        }

        assert_eq!(backend.calls(), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert_eq!(svc.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_requests_run_independently() {
        let backend = StubBackend::new(Ok(lines(&["x"])), Duration::from_millis(20));
        let svc = service(backend.clone(), Duration::from_secs(10));
        let a = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.suggest(&lines(&["one"])).await }
        });
        let b = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.suggest(&lines(&["two"])).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reaches_every_waiter() {
        let backend = StubBackend::new(Ok(lines(&["late"])), Duration::from_secs(60));
        let svc = service(backend.clone(), Duration::from_secs(10));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.suggest(&lines(&["slow"])).await })
            })
            .collect();

        for w in waiters {
            let err = w.await.unwrap().unwrap_err();
            assert_eq!(err, VirelyaError::Timeout(Duration::from_secs(10)));
        }
        assert_eq!(backend.calls(), 1);
        assert_eq!(svc.metrics().timeouts, 1);
        assert!(svc.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failure_propagates_and_is_not_cached() {
        let backend = StubBackend::new(
            Err(VirelyaError::BackendUnavailable("down".into())),
            Duration::ZERO,
        );
        let svc = service(backend.clone(), Duration::from_secs(10));
        for _ in 0..2 {
            let err = svc.suggest(&lines(&["x"])).await.unwrap_err();
            assert_eq!(err, VirelyaError::BackendUnavailable("down".into()));
        }
        // Each request retried the backend because the failure was not cached.
        assert_eq!(backend.calls(), 2);
        assert_eq!(svc.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_backend_output_is_cleaned_and_capped() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .withf(|lines, count| lines.len() == 1 && lines[0] == "rain" && *count == 3)
            .times(1)
            .returning(|_, _| Ok(lines(&["a", "a", "", " b ", "c", "d", "e"])));
        mock.expect_name().return_const("mock");

        let svc = service(Arc::new(mock), Duration::from_secs(10));
        let result = svc.suggest(&lines(&["rain"])).await.unwrap();
        assert_eq!(result.suggestions, vec!["a", "b", "c"]);
        assert_eq!(result.backend, "mock");
    }

    #[tokio::test]
    async fn test_cache_eviction_forces_regeneration() {
        let backend = StubBackend::new(Ok(lines(&["x"])), Duration::ZERO);
        let svc = Arc::new(SuggestionService::new(
            RequestValidator::default(),
            Arc::new(SuggestionCache::new(2)),
            backend.clone(),
            Duration::from_secs(10),
            3,
        ));
        for l in ["a", "b", "c"] {
            svc.suggest(&lines(&[l])).await.unwrap();
        }
        // "a" was evicted by "c".
        svc.suggest(&lines(&["a"])).await.unwrap();
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_completes_after_initiating_caller_dropped() {
        let backend = StubBackend::new(Ok(lines(&["still here"])), Duration::from_millis(200));
        let svc = service(backend.clone(), Duration::from_secs(10));

        let caller = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.suggest(&lines(&["abandoned"])).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(svc.in_flight(), 1);
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(svc.cache().len(), 1);
        assert_eq!(svc.in_flight(), 0);

        let result = svc.suggest(&lines(&["abandoned"])).await.unwrap();
        assert_eq!(result.suggestions, vec!["still here"]);
        assert_eq!(backend.calls(), 1);
    }
}
