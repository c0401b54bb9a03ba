//! Eviction Cache Engines
//!
//! Bounded, thread-safe key/value stores with three interchangeable eviction
//! strategies and optional per-entry expiry:
//!
//! - [`FifoCache`]: evicts the earliest-inserted entry.
//! - [`LruCache`]: evicts the entry least recently touched.
//! - [`LfuCache`]: evicts the least-frequently-used entry, with a short
//!   protection window for freshly written entries.
//!
//! Each engine tracks its byte footprint as `len(key) + value.len()` per
//! entry and evicts one victim at a time while it exceeds its budget.

mod entry;
mod fifo;
mod lfu;
mod lru;
mod order;


use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use fifo::FifoCache;
pub use lfu::LfuCache;
pub use lru::LruCache;

pub(crate) use entry::Entry;

// == Public Constants ==
/// Protection window applied to freshly inserted LFU entries unless
/// overridden at construction.
pub const DEFAULT_LFU_PROTECTION: Duration = Duration::from_millis(5);

// == Value Contract ==
/// Anything stored in a cache engine must expose a logical byte length,
/// used for budget accounting, and must be cheap to clone out of the store.
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Logical length of the value in bytes.
    fn len(&self) -> usize;
}

impl CacheValue for String {
    fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

// == Eviction Hook ==
/// Optional callback invoked after an entry has been physically evicted.
///
/// The hook runs with the engine lock already released, so it may safely
/// call back into the cache.
pub type EvictionHook<V> = Box<dyn Fn(&str, &V) + Send + Sync>;

// == Cache Contract ==
/// The engine contract shared by all eviction strategies.
///
/// `get` and `has` are read-or-mutate: the recency and frequency strategies
/// reorder entries as a side effect, and all strategies lazily remove
/// entries whose expiry has passed. `keys`, `len` and `bytes` are pure
/// reads and never reap expired entries, so a key that has expired but was
/// not accessed since may still be reported by them.
pub trait Cache<V: CacheValue>: Send + Sync {
    /// Returns the live value for `key`, treating expired entries as absent.
    fn get(&self, key: &str) -> Option<V>;

    /// Inserts or overwrites `key`. An overwrite adjusts the byte total by
    /// the value-length delta and resets the expiry to `ttl` (`None` or a
    /// zero duration clears it). While the engine exceeds a non-zero byte
    /// budget and holds more than one entry, victims are evicted one at a
    /// time; a single entry larger than the whole budget is retained alone.
    fn set(&self, key: &str, value: V, ttl: Option<Duration>);

    /// Deletes `key` if present.
    fn remove(&self, key: &str);

    /// Like `get` but only reports presence.
    fn has(&self, key: &str) -> bool;

    /// Unordered snapshot of the stored keys.
    fn keys(&self) -> Vec<String>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Current tracked byte total.
    fn bytes(&self) -> u64;

    /// Forces eviction of exactly one victim regardless of budget.
    /// No-op on an empty engine.
    fn shrink(&self);
}

// == Strategy Tag ==
/// Selects which eviction policy a cache engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Insertion-order eviction.
    Fifo,
    /// Recency-order eviction.
    Lru,
    /// Frequency-order eviction.
    Lfu,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Strategy::Fifo),
            "lru" => Ok(Strategy::Lru),
            "lfu" => Ok(Strategy::Lfu),
            other => Err(format!("unknown cache strategy: {}", other)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Fifo => f.write_str("fifo"),
            Strategy::Lru => f.write_str("lru"),
            Strategy::Lfu => f.write_str("lfu"),
        }
    }
}

// == Engine Options ==
/// Construction parameters shared by every engine a group builds.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Eviction strategy.
    pub strategy: Strategy,
    /// Byte budget of the engine itself; 0 = unbounded.
    pub max_bytes: u64,
    /// Protection window for freshly written LFU entries.
    pub lfu_protection: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Lru,
            max_bytes: 0,
            lfu_protection: DEFAULT_LFU_PROTECTION,
        }
    }
}

// == Factory ==
/// Builds an engine for the given options.
pub fn build_cache<V: CacheValue>(opts: &CacheOptions) -> Box<dyn Cache<V>> {
    match opts.strategy {
        Strategy::Fifo => Box::new(FifoCache::new(opts.max_bytes)),
        Strategy::Lru => Box::new(LruCache::new(opts.max_bytes)),
        Strategy::Lfu => {
            Box::new(LfuCache::new(opts.max_bytes).with_protection(opts.lfu_protection))
        }
    }
}

// == Byte Budget ==
/// Shared byte-accounting state embedded in every engine.
#[derive(Debug, Default)]
pub(crate) struct ByteBudget {
    max_bytes: u64,
    used: u64,
}

impl ByteBudget {
    pub(crate) fn new(max_bytes: u64) -> Self {
        Self { max_bytes, used: 0 }
    }

    pub(crate) fn charge(&mut self, n: u64) {
        self.used += n;
    }

    pub(crate) fn credit(&mut self, n: u64) {
        self.used = self.used.saturating_sub(n);
    }

    /// Applies the delta of replacing a value of `old` bytes with `new` bytes.
    pub(crate) fn swap(&mut self, old: u64, new: u64) {
        self.credit(old);
        self.charge(new);
    }

    pub(crate) fn used(&self) -> u64 {
        self.used
    }

    /// True while a non-zero budget is exceeded.
    pub(crate) fn over(&self) -> bool {
        self.max_bytes != 0 && self.used > self.max_bytes
    }
}
