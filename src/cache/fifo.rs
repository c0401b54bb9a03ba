//! Insertion-Order Cache
//!
//! Evicts the earliest-inserted surviving entry. Overwriting a key keeps
//! its position; reads never reorder.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tracing::debug;

use crate::cache::order::{NodeId, OrderList};
use crate::cache::{ByteBudget, Cache, CacheValue, Entry, EvictionHook};

// == FIFO Cache ==
pub struct FifoCache<V: CacheValue> {
    inner: RwLock<FifoInner<V>>,
    on_evict: Option<EvictionHook<V>>,
}

struct FifoInner<V> {
    budget: ByteBudget,
    items: HashMap<String, NodeId>,
    order: OrderList<Entry<V>>,
}

impl<V: CacheValue> FifoCache<V> {
    /// Creates a cache bounded to `max_bytes` (0 = unbounded).
    pub fn new(max_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(FifoInner {
                budget: ByteBudget::new(max_bytes),
                items: HashMap::new(),
                order: OrderList::new(),
            }),
            on_evict: None,
        }
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

impl<V> FifoInner<V>
where
    V: CacheValue,
{
    /// Removes the entry at the back of the insertion order.
    fn evict_oldest(&mut self) -> Option<Entry<V>> {
        let id = self.order.back()?;
        let entry = self.order.remove(id);
        self.items.remove(&entry.key);
        self.budget.credit(entry.cost());
        debug!(key = %entry.key, "fifo evict");
        Some(entry)
    }

    fn remove_key(&mut self, key: &str) {
        if let Some(id) = self.items.remove(key) {
            let entry = self.order.remove(id);
            self.budget.credit(entry.cost());
        }
    }
}

impl<V: CacheValue> Cache<V> for FifoCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.write().unwrap();
        let id = *inner.items.get(key)?;
        if inner.order.get(id).is_expired() {
            inner.remove_key(key);
            return None;
        }
        Some(inner.order.get(id).value.clone())
    }

    fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let mut victims = Vec::new();
        {
            let mut guard = self.inner.write().unwrap();
            let inner = &mut *guard;
            match inner.items.get(key).copied() {
                Some(id) => {
                    let entry = inner.order.get_mut(id);
                    let (old, new) = (entry.value.len() as u64, value.len() as u64);
                    entry.value = value;
                    entry.set_ttl(ttl);
                    inner.budget.swap(old, new);
                }
                None => {
                    let entry = Entry::new(key, value, ttl);
                    inner.budget.charge(entry.cost());
                    let id = inner.order.push_front(entry);
                    inner.items.insert(key.to_string(), id);
                }
            }
            while inner.budget.over() && inner.order.len() > 1 {
                if let Some(victim) = inner.evict_oldest() {
                    victims.push(victim);
                }
            }
        }
        self.notify_evicted(&victims);
    }

    fn remove(&self, key: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.remove_key(key);
    }

    fn has(&self, key: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        let Some(&id) = inner.items.get(key) else {
            return false;
        };
        if inner.order.get(id).is_expired() {
            inner.remove_key(key);
            return false;
        }
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
            inner.evict_oldest()
        };
        if let Some(victim) = victim {
            self.notify_evicted(std::slice::from_ref(&victim));
        }
    }
}
