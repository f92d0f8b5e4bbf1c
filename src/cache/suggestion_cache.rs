//! Suggestion cache keyed by request fingerprint.
//!
//! A fingerprint is a SHA-256 digest over the normalized context lines. Entries
//! are evicted least-recently-used once the store exceeds its capacity; both
//! `lookup` hits and `store` overwrites refresh recency. All methods take
//! `&self` and serialize through one internal mutex, so a single instance can
//! be shared across request handlers.
//!
//! The cache can be written to a JSON snapshot on shutdown and reloaded at
//! startup; nothing is persisted while the process runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::SuggestionResult;
use crate::validate::SuggestionRequest;

/// Stable hex digest identifying a normalized request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a validated request.
    pub fn of(request: &SuggestionRequest) -> Self {
        Self::of_lines(request.lines())
    }

    /// Hash `lines` with length-prefixed encoding so that `["ab", "c"]` and
    /// `["a", "bc"]` do not collide.
    pub fn of_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((lines.len() as u64).to_le_bytes());
        for line in lines {
            let line = line.as_ref();
            hasher.update((line.len() as u64).to_le_bytes());
            hasher.update(line.as_bytes());
        }
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for a 64-character lowercase hex digest.
    fn is_well_formed(&self) -> bool {
        self.0.len() == 64 && self.0.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached result plus bookkeeping. The result itself is never mutated.
#[derive(Debug, Clone)]
struct CacheEntry {
    result: Arc<SuggestionResult>,
    created_at: DateTime<Utc>,
    hits: u64,
    /// Monotonic recency stamp; the smallest value is the LRU entry.
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_lru(&mut self) {
        if let Some(lru) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
        {
            debug!(fingerprint = %lru.short(), "Evicting LRU cache entry");
            self.entries.remove(&lru);
        }
    }
}

/// On-disk form of one entry.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    fingerprint: Fingerprint,
    result: SuggestionResult,
    created_at: DateTime<Utc>,
    hits: u64,
}

/// Snapshot file contents, ordered least- to most-recently used.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

/// Thread-safe LRU cache of suggestion results.
pub struct SuggestionCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl SuggestionCache {
    /// Create an empty cache. `capacity` is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
        }
    }

    /// Return the cached result for `fingerprint`, refreshing its recency.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<SuggestionResult>> {
        let mut state = self.lock();
        let now = state.tick();
        let entry = state.entries.get_mut(fingerprint)?;
        entry.last_used = now;
        entry.hits = entry.hits.saturating_add(1);
        Some(Arc::clone(&entry.result))
    }

    /// Insert or overwrite the entry for `fingerprint`.
    ///
    /// Overwriting replaces the entry and makes it most recently used.
    /// Inserting a new fingerprint into a full cache evicts the LRU entry.
    pub fn store(&self, fingerprint: Fingerprint, result: Arc<SuggestionResult>) {
        let mut state = self.lock();
        let now = state.tick();
        if !state.entries.contains_key(&fingerprint) {
            while state.entries.len() >= self.capacity {
                state.evict_lru();
            }
        }
        state.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                created_at: Utc::now(),
                hits: 0,
                last_used: now,
            },
        );
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            total_hits: state.entries.values().map(|e| e.hits).sum(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().entries.contains_key(fingerprint)
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Load a snapshot written by [`save_snapshot`](Self::save_snapshot).
    ///
    /// A missing or corrupt file yields an empty cache. When the snapshot
    /// holds more entries than `capacity`, the most recently used survive.
    pub fn load_snapshot(path: &Path, capacity: usize) -> Self {
        let cache = Self::new(capacity);
        let snapshot: Snapshot = match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Cache snapshot is corrupt, starting empty: {}", e);
                    return cache;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return cache,
            Err(e) => {
                warn!("Failed to read cache snapshot, starting empty: {}", e);
                return cache;
            }
        };

        {
            let mut state = cache.lock();
            let total = snapshot.entries.len();
            let entries: Vec<SnapshotEntry> = snapshot
                .entries
                .into_iter()
                .filter(|e| e.fingerprint.is_well_formed())
                .collect();
            if entries.len() < total {
                warn!(
                    dropped = total - entries.len(),
                    "Ignoring cache snapshot entries with malformed fingerprints"
                );
            }
            let skip = entries.len().saturating_sub(cache.capacity);
            for entry in entries.into_iter().skip(skip) {
                let now = state.tick();
                state.entries.insert(
                    entry.fingerprint,
                    CacheEntry {
                        result: Arc::new(entry.result),
                        created_at: entry.created_at,
                        hits: entry.hits,
                        last_used: now,
                    },
                );
            }
            debug!(entries = state.entries.len(), "Loaded cache snapshot");
        }
        cache
    }

    /// Write all entries to `path`, oldest first.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = {
            let state = self.lock();
            let mut ordered: Vec<(&Fingerprint, &CacheEntry)> = state.entries.iter().collect();
            ordered.sort_by_key(|(_, e)| e.last_used);
            Snapshot {
                entries: ordered
                    .into_iter()
                    .map(|(fp, e)| SnapshotEntry {
                        fingerprint: fp.clone(),
                        result: (*e.result).clone(),
                        created_at: e.created_at,
                        hits: e.hits,
                    })
                    .collect(),
            }
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        debug!(entries = snapshot.entries.len(), path = %path.display(), "Saved cache snapshot");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are only ever inserted whole, so a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries currently in the cache.
    pub entries: usize,
    /// Configured maximum number of entries.
    pub capacity: usize,
    /// Cumulative hits across live entries.
    pub total_hits: u64,
}
