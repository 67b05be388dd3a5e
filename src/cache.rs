use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub active: usize,
    pub expired: usize,
    pub total: usize,
}

/// In-process TTL cache for derived analytics.
///
/// Keys follow `summary_<userId>_...` / `analytics_<userId>_...` so that a
/// ledger write can drop everything derived for one user with two prefix
/// invalidations. Expired entries are reaped on lookup, on insert and when
/// stats are taken.
pub struct AnalyticsCache {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AnalyticsCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raw lookup; evicts the entry if it has expired.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                debug!(key, "cache entry expired");
                None
            }
            None => {
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Typed lookup. An entry that no longer decodes as `T` counts as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "cached value has unexpected shape");
                self.invalidate(key);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "value not cacheable");
                return;
            }
        };
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn invalidate_by_prefix(&self, prefix: &str) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        debug!(prefix, removed = before - entries.len(), "cache invalidated");
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Counts as of the call; expired entries are dropped afterwards.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut entries = self.lock();
        let total = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let active = entries.len();
        CacheStats {
            active,
            expired: total - active,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> AnalyticsCache {
        AnalyticsCache::new(Duration::from_secs(300))
    }

    #[test]
    fn set_then_get_returns_value() {
        let c = cache();
        c.set("summary_u1_all", &42u32);
        assert_eq!(c.get_as::<u32>("summary_u1_all"), Some(42));
    }

    #[test]
    fn set_overwrites() {
        let c = cache();
        c.set("k", &"old");
        c.set("k", &"new");
        assert_eq!(c.get_as::<String>("k").as_deref(), Some("new"));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_evicted() {
        let c = cache();
        c.set_with_ttl("k", &1, Duration::ZERO);
        assert_eq!(c.stats().expired, 1);
        assert!(c.get("k").is_none());
        assert_eq!(c.stats().total, 0);
    }

    #[test]
    fn prefix_invalidation_only_touches_matching_keys() {
        let c = cache();
        c.set("summary_u1_all", &1);
        c.set("summary_u1_2025-01", &2);
        c.set("analytics_u1_trends", &3);
        c.set("summary_u2_all", &4);

        c.invalidate_by_prefix("summary_u1");

        assert!(c.get("summary_u1_all").is_none());
        assert!(c.get("summary_u1_2025-01").is_none());
        assert!(c.get("analytics_u1_trends").is_some());
        assert!(c.get("summary_u2_all").is_some());
    }

    #[test]
    fn stats_count_active_and_expired() {
        let c = cache();
        c.set("a", &1);
        c.set_with_ttl("b", &2, Duration::ZERO);
        assert_eq!(
            c.stats(),
            CacheStats {
                active: 1,
                expired: 1,
                total: 2
            }
        );
        c.clear();
        assert_eq!(c.stats().total, 0);
    }

    #[test]
    fn expired_entries_do_not_accumulate() {
        let c = AnalyticsCache::new(Duration::ZERO);
        for i in 0..1000 {
            c.set(&format!("summary_u1_{i}"), &i);
        }
        assert_eq!(c.stats().total, 1);
        assert_eq!(c.stats().total, 0);
    }

    #[test]
    fn wrong_shape_is_a_miss() {
        let c = cache();
        c.set("k", &"text");
        assert!(c.get_as::<u32>("k").is_none());
        assert!(c.get("k").is_none());
    }
}
