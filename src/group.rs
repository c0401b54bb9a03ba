//! Group Orchestrator
//!
//! A group is a named cache-and-load unit. Its read path checks the main
//! cache (keys this node owns on the hash ring) and the hot cache (keys
//! owned elsewhere but popular here), then falls into a deduplicated load
//! that asks the owning peer or, failing that, the local source callback.
//!
//! Both caches share one byte budget; when a write pushes the pair over
//! it, the group shrinks whichever cache the rebalancing rule picks until
//! the budget holds again.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::byteview::ByteView;
use crate::cache::{build_cache, Cache, CacheOptions};
use crate::error::{GroupError, Result};
use crate::peers::{PeerGetter, PeerPicker};
use crate::singleflight::Flight;

// == Source Contract ==
/// The local fallback data source of a group: asked for the raw bytes of
/// a key this node owns (or when every peer path failed).
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Adapts a plain closure into a [`Getter`].
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        (self.0)(key)
    }
}

// == Group Stats ==
/// Snapshot of a group's cache footprint.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub main_bytes: u64,
    pub hot_bytes: u64,
    pub main_entries: usize,
    pub hot_entries: usize,
    pub cache_bytes: i64,
}

/// Which of the group's two caches a write lands in.
enum CacheSlot {
    Main,
    Hot,
}

// == Group ==
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    /// Keys the consistent hash assigns to this node.
    main_cache: Box<dyn Cache<ByteView>>,
    /// Keys owned by other nodes but popular enough to keep around.
    hot_cache: Box<dyn Cache<ByteView>>,
    /// Combined byte budget of both caches; <= 0 disables caching.
    cache_bytes: i64,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    loader: Flight<Result<ByteView>>,
}

impl Group {
    fn new(name: &str, cache_bytes: i64, getter: Arc<dyn Getter>, opts: &CacheOptions) -> Self {
        Self {
            name: name.to_string(),
            getter,
            main_cache: build_cache(opts),
            hot_cache: build_cache(opts),
            cache_bytes,
            peers: OnceLock::new(),
            loader: Flight::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds the peer picker. Calling this twice is a programmer error:
    /// it would silently change routing mid-flight.
    ///
    /// # Panics
    /// Panics if a picker is already bound.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        if self.peers.set(peers).is_err() {
            panic!("register_peers called more than once");
        }
    }

    /// Returns the value for `key`, serving from cache when possible and
    /// loading it (once across concurrent callers) otherwise.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(GroupError::EmptyKey);
        }
        if let Some(value) = self.lookup_cache(key) {
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }
        self.load(key).await
    }

    /// Writes a value straight into the main cache with an optional ttl.
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        if key.is_empty() {
            return Err(GroupError::EmptyKey);
        }
        self.populate_cache(key, ByteView::new(value), CacheSlot::Main, ttl);
        Ok(())
    }

    /// Drops `key` from both caches.
    pub fn remove(&self, key: &str) {
        self.main_cache.remove(key);
        self.hot_cache.remove(key);
    }

    pub fn stats(&self) -> GroupStats {
        GroupStats {
            main_bytes: self.main_cache.bytes(),
            hot_bytes: self.hot_cache.bytes(),
            main_entries: self.main_cache.len(),
            hot_entries: self.hot_cache.len(),
            cache_bytes: self.cache_bytes,
        }
    }

    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        if self.cache_bytes <= 0 {
            return None;
        }
        self.main_cache
            .get(key)
            .or_else(|| self.hot_cache.get(key))
    }

    /// The key missed both caches: ask the owning peer or the local
    /// source, deduplicating concurrent callers of the same key.
    async fn load(&self, key: &str) -> Result<ByteView> {
        self.loader
            .execute(key, || async {
                if let Some(peers) = self.peers.get() {
                    if let Some(peer) = peers.pick_peer(key) {
                        match self.get_from_peer(peer.as_ref(), key).await {
                            Ok(value) => return Ok(value),
                            // Peer failures are recoverable: fall through
                            // to the local source
                            Err(err) => {
                                warn!(group = %self.name, key, %err, "failed to get from peer")
                            }
                        }
                    }
                }
                self.get_locally(key).await
            })
            .await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bts = peer.get(&self.name, key).await?;
        let value = ByteView::new(bts);
        // A remotely fetched key is by definition popular enough to have
        // been asked for here: keep a local replica
        self.populate_cache(key, value.clone(), CacheSlot::Hot, None);
        Ok(value)
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bts = self.getter.get(key).await?;
        let value = ByteView::new(bts);
        self.populate_cache(key, value.clone(), CacheSlot::Main, None);
        Ok(value)
    }

    /// Inserts into the chosen cache, then shrinks whichever cache the
    /// rebalancing rule picks until the combined budget holds. The hot
    /// cache only gives up entries while it exceeds a sixteenth of the
    /// main cache's bytes.
    fn populate_cache(&self, key: &str, value: ByteView, slot: CacheSlot, ttl: Option<Duration>) {
        if self.cache_bytes <= 0 {
            return;
        }
        let target: &dyn Cache<ByteView> = match slot {
            CacheSlot::Main => self.main_cache.as_ref(),
            CacheSlot::Hot => self.hot_cache.as_ref(),
        };
        target.set(key, value, ttl);

        loop {
            let main_bytes = self.main_cache.bytes();
            let hot_bytes = self.hot_cache.bytes();
            if main_bytes + hot_bytes <= self.cache_bytes as u64 {
                return;
            }
            let victim: &dyn Cache<ByteView> = if hot_bytes > main_bytes / 16 {
                self.hot_cache.as_ref()
            } else {
                self.main_cache.as_ref()
            };
            victim.shrink();
        }
    }
}

// == Registry ==
/// Owns every group of the process by name. Creation and lookup take the
/// registry's own lock; cache contents never do.
pub struct Registry {
    opts: CacheOptions,
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Creates a registry whose groups build their caches from `opts`.
    pub fn new(opts: CacheOptions) -> Self {
        Self {
            opts,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Creates and registers a group. A group already registered under
    /// `name` is replaced.
    pub fn new_group(&self, name: &str, cache_bytes: i64, getter: Arc<dyn Getter>) -> Arc<Group> {
        let group = Arc::new(Group::new(name, cache_bytes, getter, &self.opts));
        self.groups
            .write()
            .unwrap()
            .insert(name.to_string(), group.clone());
        group
    }

    /// Looks up a group by name.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().unwrap().get(name).cloned()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scores_db() -> HashMap<&'static str, &'static str> {
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
    }

    /// Source over the static score table, counting loads per key.
    struct CountingSource {
        loads: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Getter for CountingSource {
        async fn get(&self, key: &str) -> Result<Vec<u8>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            scores_db()
                .get(key)
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| GroupError::NotFound(key.to_string()))
        }
    }

    struct StaticPeerGetter {
        value: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PeerGetter for StaticPeerGetter {
        async fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.as_bytes().to_vec())
        }
    }

    struct FailingPeerGetter;

    #[async_trait]
    impl PeerGetter for FailingPeerGetter {
        async fn get(&self, _group: &str, key: &str) -> Result<Vec<u8>> {
            Err(GroupError::Peer(format!("peer has no {}", key)))
        }
    }

    /// Routes every key to one fixed peer.
    struct SinglePeerPicker(Arc<dyn PeerGetter>);

    impl PeerPicker for SinglePeerPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(self.0.clone())
        }
    }

    fn registry() -> Registry {
        Registry::new(CacheOptions::default())
    }

    #[tokio::test]
    async fn test_group_serves_second_get_from_cache() {
        let source = CountingSource::new();
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, source.clone());

        let view = group.get("Tom").await.unwrap();
        assert_eq!(view.to_string(), "630");
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        let view = group.get("Tom").await.unwrap();
        assert_eq!(view.to_string(), "630");
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_unknown_key_surfaces_source_error() {
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, CountingSource::new());
        let err = group.get("unknown").await.unwrap_err();
        assert_eq!(err, GroupError::NotFound("unknown".to_string()));
    }

    #[tokio::test]
    async fn test_group_empty_key_rejected() {
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, CountingSource::new());
        assert_eq!(group.get("").await.unwrap_err(), GroupError::EmptyKey);
        assert!(group.set("", b"630".to_vec(), None).is_err());
    }

    #[tokio::test]
    async fn test_group_zero_budget_disables_caching() {
        let source = CountingSource::new();
        let reg = registry();
        let group = reg.new_group("scores", 0, source.clone());

        group.get("Tom").await.unwrap();
        group.get("Tom").await.unwrap();
        // Every get went to the source
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(group.stats().main_entries, 0);
    }

    #[tokio::test]
    async fn test_group_set_then_get() {
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, CountingSource::new());
        group.set("Tom", b"630".to_vec(), None).unwrap();
        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
    }

    #[tokio::test]
    async fn test_group_remove_drops_cached_value() {
        let source = CountingSource::new();
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, source.clone());
        group.get("Tom").await.unwrap();
        group.remove("Tom");
        group.get("Tom").await.unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[should_panic(expected = "register_peers called more than once")]
    async fn test_register_peers_twice_panics() {
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, CountingSource::new());
        let getter: Arc<dyn PeerGetter> = Arc::new(FailingPeerGetter);
        group.register_peers(Arc::new(SinglePeerPicker(getter.clone())));
        group.register_peers(Arc::new(SinglePeerPicker(getter)));
    }

    #[tokio::test]
    async fn test_group_remote_fetch_lands_in_hot_cache() {
        let source = CountingSource::new();
        let peer = Arc::new(StaticPeerGetter {
            value: "630",
            calls: AtomicUsize::new(0),
        });
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, source.clone());
        group.register_peers(Arc::new(SinglePeerPicker(peer.clone())));

        let view = group.get("Tom").await.unwrap();
        assert_eq!(view.to_string(), "630");
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        // Served remotely: the local source never ran, the replica is hot
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
        let stats = group.stats();
        assert_eq!(stats.hot_entries, 1);
        assert_eq!(stats.main_entries, 0);

        // The hot replica now serves without another remote call
        group.get("Tom").await.unwrap();
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_peer_failure_falls_back_to_source() {
        let source = CountingSource::new();
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, source.clone());
        group.register_peers(Arc::new(SinglePeerPicker(Arc::new(FailingPeerGetter))));

        let view = group.get("Tom").await.unwrap();
        assert_eq!(view.to_string(), "630");
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_concurrent_gets_load_once() {
        struct SlowSource {
            loads: AtomicUsize,
        }

        #[async_trait]
        impl Getter for SlowSource {
            async fn get(&self, _key: &str) -> Result<Vec<u8>> {
                self.loads.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(b"630".to_vec())
            }
        }

        let source = Arc::new(SlowSource {
            loads: AtomicUsize::new(0),
        });
        let reg = registry();
        let group = reg.new_group("scores", 2 << 10, source.clone());

        let first = {
            let group = group.clone();
            tokio::spawn(async move { group.get("Tom").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = {
            let group = group.clone();
            tokio::spawn(async move { group.get("Tom").await })
        };

        assert_eq!(first.await.unwrap().unwrap().to_string(), "630");
        assert_eq!(second.await.unwrap().unwrap().to_string(), "630");
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_rebalances_combined_budget() {
        let reg = registry();
        let group = reg.new_group("scores", 32, CountingSource::new());

        // Fill both caches to the budget: sixteen entries of two bytes
        for i in 0..8 {
            let key = i.to_string();
            group.set(&key, b"0".to_vec(), None).unwrap();
            group.populate_cache(&key, ByteView::from("0"), CacheSlot::Hot, None);
        }
        assert_eq!(group.stats().main_entries, 8);
        assert_eq!(group.stats().hot_entries, 8);

        // A six-byte hot write must squeeze the pair back under budget
        group.populate_cache("Tom", ByteView::from("630"), CacheSlot::Hot, None);
        let stats = group.stats();
        assert!(stats.main_bytes + stats.hot_bytes <= 32);
        assert!(stats.hot_bytes >= 2);
    }

    #[test]
    fn test_registry_lookup() {
        let reg = registry();
        assert!(reg.get_group("scores").is_none());
        let group = reg.new_group("scores", 2 << 10, CountingSource::new());
        let found = reg.get_group("scores").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
        assert_eq!(found.name(), "scores");
    }

    #[test]
    fn test_registry_replaces_group_with_same_name() {
        let reg = registry();
        let first = reg.new_group("scores", 2 << 10, CountingSource::new());
        let second = reg.new_group("scores", 2 << 10, CountingSource::new());
        let found = reg.get_group("scores").unwrap();
        assert!(!Arc::ptr_eq(&first, &found));
        assert!(Arc::ptr_eq(&second, &found));
    }
}
