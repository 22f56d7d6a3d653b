//! TTL + LRU bounded cache for web search results.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
    /// Bypass the cache in [`SearchService`](crate::bot::search::SearchService).
    pub disabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_size: 100,
            disabled: false,
        }
    }
}

pub trait SearchCache: Send + Sync {
    fn get(&self, query: &str) -> Option<String>;
    fn set(&self, query: &str, result: &str);
    fn clear(&self);
}

/// Trim, lowercase and collapse inner whitespace so equivalent queries
/// share one key.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

struct Entry {
    result: String,
    created: Instant,
    accessed: Instant,
    /// Access order; breaks ties between equal `accessed` instants.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

pub struct MemoryCache {
    inner: Mutex<Inner>,
    config: CacheConfig,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.created) > self.config.ttl
    }
}

impl SearchCache for MemoryCache {
    fn get(&self, query: &str) -> Option<String> {
        let key = normalize_query(query);
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = match inner.entries.get(&key) {
            None => return None,
            Some(entry) => self.expired(entry, now),
        };
        if expired {
            inner.entries.remove(&key);
            return None;
        }

        let seq = inner.next_seq();
        let entry = inner.entries.get_mut(&key)?;
        entry.accessed = now;
        entry.seq = seq;
        Some(entry.result.clone())
    }

    fn set(&self, query: &str, result: &str) {
        let key = normalize_query(query);
        let now = Instant::now();
        let mut inner = self.lock();

        inner.entries.retain(|_, e| now.duration_since(e.created) <= self.config.ttl);

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_size {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.accessed, e.seq))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }

        let seq = inner.next_seq();
        inner.entries.insert(
            key,
            Entry {
                result: result.to_string(),
                created: now,
                accessed: now,
                seq,
            },
        );
    }

    fn clear(&self) {
        self.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_secs: u64, max_size: usize) -> MemoryCache {
        MemoryCache::new(CacheConfig {
            ttl: Duration::from_secs(ttl_secs),
            max_size,
            disabled: false,
        })
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Bitcoin   NEWS\ttoday "), "bitcoin news today");
        assert_eq!(normalize_query("   "), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_equivalent_queries_collide() {
        let c = cache(60, 10);
        c.set("Rust Async ", "result");
        assert_eq!(c.get("rust   async").as_deref(), Some("result"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_result_is_cacheable() {
        let c = cache(60, 10);
        c.set("q", "");
        assert_eq!(c.get("q").as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let c = cache(10, 10);
        c.set("q", "r");
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(c.get("q").as_deref(), Some("r"));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(c.get("q"), None);
        assert!(c.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_extend_ttl() {
        let c = cache(10, 10);
        c.set("q", "r");
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(c.get("q").is_some());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(c.get("q").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_removes_least_recently_accessed() {
        let c = cache(600, 3);
        c.set("a", "1");
        tokio::time::advance(Duration::from_secs(1)).await;
        c.set("b", "2");
        tokio::time::advance(Duration::from_secs(1)).await;
        c.set("c", "3");
        tokio::time::advance(Duration::from_secs(1)).await;
        // "a" becomes the most recently used.
        assert!(c.get("a").is_some());
        tokio::time::advance(Duration::from_secs(1)).await;

        c.set("d", "4");
        assert_eq!(c.len(), 3);
        assert!(c.get("b").is_none());
        assert!(c.get("a").is_some());
        assert!(c.get("c").is_some());
        assert!(c.get("d").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_tie_break_is_access_order() {
        // Clock never advances: every entry shares one timestamp.
        let c = cache(600, 2);
        c.set("a", "1");
        c.set("b", "2");
        assert!(c.get("a").is_some());
        c.set("c", "3");
        assert!(c.get("b").is_none());
        assert!(c.get("a").is_some());
        assert!(c.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_purges_expired_before_evicting() {
        let c = cache(10, 2);
        c.set("old", "1");
        tokio::time::advance(Duration::from_secs(5)).await;
        c.set("fresh", "2");
        tokio::time::advance(Duration::from_secs(6)).await;
        // "old" expired, so inserting does not need to evict "fresh".
        c.set("new", "3");
        assert!(c.get("fresh").is_some());
        assert!(c.get("new").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_at_capacity_keeps_others() {
        let c = cache(600, 2);
        c.set("a", "1");
        c.set("b", "2");
        c.set("a", "updated");
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a").as_deref(), Some("updated"));
        assert!(c.get("b").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let c = cache(600, 10);
        c.set("a", "1");
        c.set("b", "2");
        c.clear();
        assert!(c.is_empty());
        assert!(c.get("a").is_none());
    }
}
