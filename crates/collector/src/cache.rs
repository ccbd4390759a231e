// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Short-TTL memoization of collected load profiles.
//!
//! Several variants usually share a model; the cache collapses their
//! backend queries into one per `(model, namespace)` per TTL window. The
//! cache is the only mutable state shared across ticks. Reads take the
//! shared lock, mutations the exclusive lock, and entries are copied out so
//! callers can never mutate cached state in place.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use wva_config::load::LoadProfile;

/// TTL used when the constructor receives a zero TTL.
pub const FALLBACK_TTL: Duration = Duration::from_secs(30);

/// One cached collection result.
///
/// `valid=false` entries memoize collection *failures*: within one TTL
/// window a failed model is not retried by every variant that shares it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheEntry {
    /// The collected load profile.
    pub load: LoadProfile,
    /// Aggregate request count over the model's retention window.
    pub total_requests: f64,
    /// Whether collection succeeded.
    pub valid: bool,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: CacheEntry,
    last_updated: Instant,
}

/// Keyed, TTL-bounded, thread-safe metrics cache.
///
/// The TTL tracks the reconciliation interval, which is re-read from the
/// config store every tick; [`MetricsCache::set_ttl`] applies the
/// re-derived value.
#[derive(Debug)]
pub struct MetricsCache {
    ttl: RwLock<Duration>,
    entries: RwLock<HashMap<(String, String), StoredEntry>>,
}

/// A zero TTL falls back to [`FALLBACK_TTL`] with a warning: a cache that
/// can never hit would silently turn into a thundering herd.
fn effective_ttl(ttl: Duration) -> Duration {
    if ttl.is_zero() {
        tracing::warn!(
            fallback_secs = FALLBACK_TTL.as_secs(),
            "metrics cache TTL is zero, using fallback"
        );
        FALLBACK_TTL
    } else {
        ttl
    }
}

impl MetricsCache {
    /// Creates a cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: RwLock::new(effective_ttl(ttl)),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The effective TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        *self.ttl.read()
    }

    /// Applies a re-derived TTL, keeping existing entries.
    ///
    /// Called at the top of every tick with half the freshly-read
    /// reconciliation interval; a zero value falls back as in
    /// [`MetricsCache::new`].
    pub fn set_ttl(&self, ttl: Duration) {
        let ttl = effective_ttl(ttl);
        let mut current = self.ttl.write();
        if *current != ttl {
            tracing::debug!(
                from_secs = current.as_secs(),
                to_secs = ttl.as_secs(),
                "metrics cache TTL updated"
            );
            *current = ttl;
        }
    }

    /// Returns a copy of the cached entry iff it is within TTL.
    #[must_use]
    pub fn get(&self, model: &str, namespace: &str) -> Option<CacheEntry> {
        let ttl = self.ttl();
        let entries = self.entries.read();
        let stored = entries.get(&(model.to_owned(), namespace.to_owned()))?;
        (stored.last_updated.elapsed() <= ttl).then_some(stored.entry)
    }

    /// Stores an entry, stamping it with the current time.
    pub fn set(&self, model: &str, namespace: &str, entry: CacheEntry) {
        let mut entries = self.entries.write();
        let _ = entries.insert(
            (model.to_owned(), namespace.to_owned()),
            StoredEntry {
                entry,
                last_updated: Instant::now(),
            },
        );
    }

    /// Forces the next lookup for the key to miss.
    pub fn invalidate(&self, model: &str, namespace: &str) {
        let mut entries = self.entries.write();
        let _ = entries.remove(&(model.to_owned(), namespace.to_owned()));
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Removes expired entries. Callable periodically; correctness never
    /// depends on it since `get` checks TTL itself.
    pub fn cleanup(&self) {
        let ttl = self.ttl();
        let mut entries = self.entries.write();
        entries.retain(|_, stored| stored.last_updated.elapsed() <= ttl);
    }

    /// Number of entries currently stored, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(arrival_rate: f64) -> CacheEntry {
        CacheEntry {
            load: LoadProfile {
                arrival_rate,
                ..LoadProfile::default()
            },
            total_requests: arrival_rate,
            valid: true,
        }
    }

    #[test]
    fn set_then_get_returns_value() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        cache.set("llama", "prod", entry(60.0));
        let got = cache.get("llama", "prod").expect("hit");
        assert!((got.load.arrival_rate - 60.0).abs() < f64::EPSILON);
        assert!(got.valid);
    }

    #[test]
    fn keys_are_model_and_namespace() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        cache.set("llama", "prod", entry(1.0));
        assert!(cache.get("llama", "staging").is_none());
        assert!(cache.get("mistral", "prod").is_none());
    }

    #[test]
    fn expired_entries_miss() {
        let cache = MetricsCache::new(Duration::from_millis(10));
        cache.set("llama", "prod", entry(1.0));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("llama", "prod").is_none());
    }

    #[test]
    fn invalidate_forces_miss() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        cache.set("llama", "prod", entry(1.0));
        cache.invalidate("llama", "prod");
        assert!(cache.get("llama", "prod").is_none());
    }

    #[test]
    fn cleanup_drops_only_expired() {
        let cache = MetricsCache::new(Duration::from_millis(50));
        cache.set("old", "prod", entry(1.0));
        std::thread::sleep(Duration::from_millis(80));
        cache.set("fresh", "prod", entry(2.0));
        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh", "prod").is_some());
    }

    #[test]
    fn zero_ttl_falls_back() {
        let cache = MetricsCache::new(Duration::ZERO);
        assert_eq!(cache.ttl(), FALLBACK_TTL);

        cache.set_ttl(Duration::ZERO);
        assert_eq!(cache.ttl(), FALLBACK_TTL);
    }

    #[test]
    fn ttl_update_applies_to_existing_entries() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        cache.set("llama", "prod", entry(1.0));

        cache.set_ttl(Duration::from_millis(10));
        assert_eq!(cache.ttl(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert!(
            cache.get("llama", "prod").is_none(),
            "a tightened TTL must expire old entries"
        );

        cache.set("llama", "prod", entry(2.0));
        cache.set_ttl(Duration::from_secs(30));
        assert!(cache.get("llama", "prod").is_some());
    }

    #[test]
    fn invalid_entries_are_served_within_ttl() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        cache.set(
            "llama",
            "prod",
            CacheEntry {
                valid: false,
                ..CacheEntry::default()
            },
        );
        let got = cache.get("llama", "prod").expect("negative hit");
        assert!(!got.valid);
    }

    #[test]
    fn returned_entries_are_copies() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        cache.set("llama", "prod", entry(60.0));
        let mut got = cache.get("llama", "prod").expect("hit");
        got.load.arrival_rate = 9999.0;
        let again = cache.get("llama", "prod").expect("hit");
        assert!((again.load.arrival_rate - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = MetricsCache::new(Duration::from_secs(30));
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let cache = &cache;
                let _ = scope.spawn(move || {
                    for i in 0..200 {
                        let model = format!("model-{}", (worker + i) % 3);
                        cache.set(&model, "prod", entry(f64::from(i)));
                        let _ = cache.get(&model, "prod");
                        if i % 50 == 0 {
                            cache.cleanup();
                        }
                    }
                });
            }
        });
        assert!(cache.len() <= 3);
    }
}
