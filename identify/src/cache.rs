//! Process-wide memo of extracted feature sets.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::error::FeatureError;
use crate::features::{FeatureExtractor, FeatureSet, extract_from_bytes};
use crate::record::{CacheKey, Role};

/// Default time-to-live of the whole cache.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Counters for observing cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Extractor invocations, including ones that produced no descriptors.
    pub extractions: u64,
    /// Whole-cache clears caused by the TTL.
    pub expirations: u64,
}

struct CacheInner {
    created: Instant,
    entries: HashMap<CacheKey, Arc<FeatureSet>>,
}

/// Memoizes feature sets per (role, identity, finger) key.
///
/// # Expiry
///
/// Entries share one creation timestamp. When more than `ttl` has elapsed
/// at any access, the entire cache is cleared and the timestamp reset.
///
/// # Concurrency
///
/// One mutex guards the timestamp and the map. The TTL check and lookup
/// happen under a single lock acquisition. Extraction runs outside the lock,
/// so two requests missing the same key may both extract; the first insert
/// wins and both callers receive that entry. Failed or empty extractions are
/// never cached and will be retried on the next request for the key.
pub struct FeatureCache {
    ttl: Duration,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    extractions: AtomicU64,
    expirations: AtomicU64,
}

impl FeatureCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner {
                created: Instant::now(),
                entries: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            extractions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached feature set for `key`, or decodes `bytes`,
    /// extracts features and caches them.
    pub fn get_or_compute(
        &self,
        key: &CacheKey,
        bytes: &[u8],
        extractor: &dyn FeatureExtractor,
    ) -> Result<Arc<FeatureSet>, FeatureError> {
        if let Some(found) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(found);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        self.extractions.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(extract_from_bytes(bytes, extractor)?);

        let mut inner = self.lock_fresh();
        let stored = inner.entries.entry(key.clone()).or_insert(computed);
        tracing::debug!(%key, keypoints = stored.keypoints, "cache: stored features");
        Ok(Arc::clone(stored))
    }

    /// Returns the cached feature set for `key` without computing.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<FeatureSet>> {
        self.lock_fresh().entries.get(key).cloned()
    }

    /// Removes one entry. Returns true if it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.lock_fresh().entries.remove(key).is_some();
        if removed {
            tracing::debug!(%key, "cache: invalidated");
        }
        removed
    }

    /// Removes every finger entry of one identity. Returns the number removed.
    pub fn invalidate_identity(&self, role: Role, id: &str) -> usize {
        let mut inner = self.lock_fresh();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !(k.role == role && k.id == id));
        let removed = before - inner.entries.len();
        if removed > 0 {
            tracing::debug!(%role, id, removed, "cache: invalidated identity");
        }
        removed
    }

    /// Clears the whole cache if the TTL has elapsed. Returns true if cleared.
    pub fn maybe_expire_all(&self) -> bool {
        self.expire_at(Instant::now())
    }

    /// Unconditionally drops all entries and restarts the TTL window.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.created = Instant::now();
    }

    /// Number of live entries. Expired entries are dropped first.
    pub fn len(&self) -> usize {
        self.lock_fresh().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Locks the cache, clearing it first if the TTL has elapsed.
    fn lock_fresh(&self) -> MutexGuard<'_, CacheInner> {
        let mut inner = self.inner.lock();
        self.expire_locked(&mut inner, Instant::now());
        inner
    }

    fn expire_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        self.expire_locked(&mut inner, now)
    }

    fn expire_locked(&self, inner: &mut CacheInner, now: Instant) -> bool {
        if now.saturating_duration_since(inner.created) <= self.ttl {
            return false;
        }
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.created = now;
        self.expirations.fetch_add(1, Ordering::Relaxed);
        tracing::info!(dropped, ttl_secs = self.ttl.as_secs(), "cache: ttl elapsed, cleared");
        true
    }
}

impl Default for FeatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
