//! Frequency-Order Cache
//!
//! Entries are bucketed by access count; eviction takes the
//! least-recently-inserted entry of the lowest non-empty bucket. Entries
//! written within the protection window are skipped so a value is not
//! evicted the instant it lands, unless the whole bucket is that fresh.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::order::{NodeId, OrderList};
use crate::cache::{ByteBudget, Cache, CacheValue, Entry, EvictionHook, DEFAULT_LFU_PROTECTION};

// == LFU Cache ==
pub struct LfuCache<V: CacheValue> {
    inner: RwLock<LfuInner<V>>,
    on_evict: Option<EvictionHook<V>>,
}

struct LfuEntry<V> {
    entry: Entry<V>,
    inserted: Instant,
}

struct LfuInner<V> {
    budget: ByteBudget,
    /// key -> (frequency bucket, node within that bucket's list)
    items: HashMap<String, (u64, NodeId)>,
    buckets: HashMap<u64, OrderList<LfuEntry<V>>>,
    min_freq: u64,
    protection: Duration,
}

impl<V: CacheValue> LfuCache<V> {
    /// Creates a cache bounded to `max_bytes` (0 = unbounded) with the
    /// default protection window.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(LfuInner {
                budget: ByteBudget::new(max_bytes),
                items: HashMap::new(),
                buckets: HashMap::new(),
                min_freq: 0,
                protection: DEFAULT_LFU_PROTECTION,
            }),
            on_evict: None,
        }
    }

    /// Overrides the protection window for freshly inserted entries.
    pub fn with_protection(self, protection: Duration) -> Self {
        self.inner.write().unwrap().protection = protection;
        self
    }

    /// Installs a hook invoked after each eviction, outside the lock.
    pub fn with_eviction_hook(mut self, hook: EvictionHook<V>) -> Self {
        self.on_evict = Some(hook);
        self
    }

    fn notify_evicted(&self, victims: &[Entry<V>]) {
        if let Some(hook) = &self.on_evict {
            for victim in victims {
                hook(&victim.key, &victim.value);
            }
        }
    }
}

impl<V> LfuInner<V>
where
    V: CacheValue,
{
    /// Bumps the entry's access count, moving it to the next bucket.
    fn touch(&mut self, key: &str) {
        let Some(&(freq, id)) = self.items.get(key) else {
            return;
        };
        let node = self
            .buckets
            .get_mut(&freq)
            .expect("bucket for live entry")
            .remove(id);
        let new_freq = freq + 1;
        let new_id = self
            .buckets
            .entry(new_freq)
            .or_insert_with(OrderList::new)
            .push_front(node);
        self.items.insert(key.to_string(), (new_freq, new_id));
        if self.buckets.get(&freq).is_some_and(|b| b.is_empty()) {
            self.buckets.remove(&freq);
            if self.min_freq == freq {
                self.min_freq = new_freq;
            }
        }
    }

    /// Deletes `key`, rescanning for the minimum frequency if its bucket
    /// was the minimum one and is now empty.
    fn remove_key(&mut self, key: &str) -> Option<LfuEntry<V>> {
        let (freq, id) = self.items.remove(key)?;
        let bucket = self.buckets.get_mut(&freq).expect("bucket for live entry");
        let node = bucket.remove(id);
        self.budget.credit(node.entry.cost());
        if bucket.is_empty() {
            self.buckets.remove(&freq);
            if self.min_freq == freq {
                self.min_freq = self.buckets.keys().copied().min().unwrap_or(0);
            }
        }
        Some(node)
    }

    /// Picks a victim from the minimum bucket: the oldest entry outside the
    /// protection window, or the oldest entry outright if the whole bucket
    /// is still protected.
    fn evict_least_frequent(&mut self) -> Option<LfuEntry<V>> {
        let bucket = self.buckets.get(&self.min_freq)?;
        let mut candidate = bucket.back();
        while let Some(id) = candidate {
            if bucket.get(id).inserted.elapsed() >= self.protection {
                break;
            }
            candidate = bucket.prev(id);
        }
        let id = candidate.or_else(|| bucket.back())?;
        let key = bucket.get(id).entry.key.clone();
        debug!(key = %key, freq = self.min_freq, "lfu evict");
        self.remove_key(&key)
    }
}

impl<V: CacheValue> Cache<V> for LfuCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let &(freq, id) = inner.items.get(key)?;
        let (expired, value) = {
            let bucket = inner.buckets.get(&freq).expect("bucket for live entry");
            let node = bucket.get(id);
            (node.entry.is_expired(), node.entry.value.clone())
        };
        if expired {
            let _ = inner.remove_key(key);
            return None;
        }
        inner.touch(key);
        Some(value)
    }

    fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let mut victims = Vec::new();
        {
            let mut guard = self.inner.write().unwrap();
            let inner = &mut *guard;
            match inner.items.get(key).copied() {
                Some((freq, id)) => {
                    let new = value.len() as u64;
                    let node = inner
                        .buckets
                        .get_mut(&freq)
                        .expect("bucket for live entry")
                        .get_mut(id);
                    let old = node.entry.value.len() as u64;
                    node.entry.value = value;
                    node.entry.set_ttl(ttl);
                    inner.budget.swap(old, new);
                    inner.touch(key);
                }
                None => {
                    let entry = Entry::new(key, value, ttl);
                    inner.budget.charge(entry.cost());
                    let node = LfuEntry {
                        entry,
                        inserted: Instant::now(),
                    };
                    let id = inner
                        .buckets
                        .entry(1)
                        .or_insert_with(OrderList::new)
                        .push_front(node);
                    inner.items.insert(key.to_string(), (1, id));
                    inner.min_freq = 1;
                }
            }
            while inner.budget.over() && inner.items.len() > 1 {
                match inner.evict_least_frequent() {
                    Some(victim) => victims.push(victim.entry),
                    None => break,
                }
            }
        }
        self.notify_evicted(&victims);
    }

    fn remove(&self, key: &str) {
        let mut inner = self.inner.write().unwrap();
        let _ = inner.remove_key(key);
    }

    fn has(&self, key: &str) -> bool {
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let Some(&(freq, id)) = inner.items.get(key) else {
            return false;
        };
        let expired = inner
            .buckets
            .get(&freq)
            .expect("bucket for live entry")
            .get(id)
            .entry
            .is_expired();
        if expired {
            let _ = inner.remove_key(key);
            return false;
        }
        inner.touch(key);
        true
    }

    fn keys(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.items.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner.items.len()
    }

    fn bytes(&self) -> u64 {
        let inner = self.inner.read().unwrap();
        inner.budget.used()
    }

    fn shrink(&self) {
        let victim = {
            let mut inner = self.inner.write().unwrap();
            inner.evict_least_frequent()
        };
        if let Some(victim) = victim {
            self.notify_evicted(std::slice::from_ref(&victim.entry));
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    /// Protection off: tests below control victim choice purely by counts.
    fn unprotected(max_bytes: u64) -> LfuCache<String> {
        LfuCache::new(max_bytes).with_protection(Duration::ZERO)
    }

    #[test]
    fn test_lfu_set_and_get() {
        let cache = unprotected(0);
        cache.set("key1", "1234".to_string(), None);
        assert_eq!(cache.get("key1"), Some("1234".to_string()));
        assert_eq!(cache.get("key2"), None);
    }

    #[test]
    fn test_lfu_frequent_entry_survives_eviction() {
        let cache = unprotected(0);
        cache.set("hot", "v".to_string(), None);
        cache.set("cold", "v".to_string(), None);
        cache.get("hot");
        cache.get("hot");
        cache.shrink();
        assert_eq!(cache.get("cold"), None);
        assert!(cache.get("hot").is_some());
    }

    #[test]
    fn test_lfu_ties_break_by_insertion_age() {
        let cache = unprotected(0);
        cache.set("first", "v".to_string(), None);
        cache.set("second", "v".to_string(), None);
        cache.set("third", "v".to_string(), None);
        // All at frequency 1: the earliest insert goes first
        cache.shrink();
        assert_eq!(cache.get("first"), None);
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_lfu_budget_eviction_removes_least_frequent() {
        // Each entry costs 8 bytes
        let cache = unprotected(16);
        cache.set("k1", "111111".to_string(), None);
        cache.set("k2", "222222".to_string(), None);
        cache.get("k1");
        cache.set("k3", "333333".to_string(), None);
        assert!(cache.get("k1").is_some());
        assert_eq!(cache.get("k2"), None);
        assert!(cache.get("k3").is_some());
        assert!(cache.bytes() <= 16);
    }

    #[test]
    fn test_lfu_protection_skips_fresh_entries() {
        let cache = LfuCache::new(0).with_protection(Duration::from_millis(50));
        cache.set("old", "v".to_string(), None);
        sleep(Duration::from_millis(60));
        cache.set("new", "v".to_string(), None);
        // Promote both to frequency 2; "new" ends up least recently touched
        cache.get("new");
        cache.get("old");
        // The bucket's oldest position holds "new", but it is protected
        cache.shrink();
        assert_eq!(cache.get("old"), None);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_lfu_fully_protected_bucket_still_evicts() {
        let cache = LfuCache::new(0).with_protection(Duration::from_secs(10));
        cache.set("k1", "v".to_string(), None);
        cache.set("k2", "v".to_string(), None);
        cache.shrink();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k1"), None);
        assert!(cache.get("k2").is_some());
    }

    #[test]
    fn test_lfu_min_freq_recomputed_after_removal() {
        let cache = unprotected(0);
        cache.set("hot", "v".to_string(), None);
        cache.get("hot");
        cache.get("hot");
        cache.set("cold", "v".to_string(), None);
        // Removing the only frequency-1 entry leaves "hot" as the minimum
        cache.remove("cold");
        cache.shrink();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lfu_overwrite_bumps_frequency_and_bytes() {
        let cache = unprotected(0);
        cache.set("k1", "1234".to_string(), None);
        cache.set("k1", "123456".to_string(), None);
        cache.set("k2", "v".to_string(), None);
        assert_eq!(cache.bytes(), 8 + 3);
        // k1 sits at frequency 2 after the overwrite, so k2 goes first
        cache.shrink();
        assert_eq!(cache.get("k2"), None);
        assert!(cache.get("k1").is_some());
    }

    #[test]
    fn test_lfu_ttl_expiry_lazy() {
        let cache = unprotected(0);
        cache.set("key1", "1234".to_string(), Some(Duration::from_millis(10)));
        sleep(Duration::from_millis(20));
        assert!(!cache.has("key1"));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.bytes(), 0);
    }

    #[test]
    fn test_lfu_shrink_on_empty_is_noop() {
        let cache: LfuCache<String> = LfuCache::new(0);
        cache.shrink();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lfu_oversized_entry_is_retained_alone() {
        let cache = unprotected(10);
        cache.set("k1", "11".to_string(), None);
        cache.set("big", "a-value-larger-than-the-budget".to_string(), None);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("big").is_some());
    }
}
