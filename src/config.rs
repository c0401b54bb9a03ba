//! Configuration Module
//!
//! Every knob is a command-line flag with an `HIVECACHE_*` environment
//! fallback and a sensible default, so a node can run with no arguments
//! at all or be fully driven from the environment.

use std::time::Duration;

use clap::Parser;

use crate::cache::{CacheOptions, Strategy};

/// Server configuration parameters.
#[derive(Debug, Clone, Parser)]
#[command(name = "hivecache", version, about = "Peer-distributed in-process cache server")]
pub struct Config {
    /// HTTP port to listen on
    #[arg(short, long, env = "HIVECACHE_PORT", default_value_t = 5658)]
    pub port: u16,

    /// Base URL other peers reach this node at; defaults to
    /// http://localhost:<port>
    #[arg(long, env = "HIVECACHE_SELF_ADDR")]
    pub self_addr: Option<String>,

    /// Comma-separated peer base URLs, including this node's own
    #[arg(long, env = "HIVECACHE_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Eviction strategy: fifo, lru or lfu
    #[arg(short = 's', long, env = "HIVECACHE_STRATEGY", default_value = "lru")]
    pub cache_strategy: Strategy,

    /// Combined main+hot cache byte budget per group
    #[arg(long, env = "HIVECACHE_CACHE_BYTES", default_value_t = 2 << 10)]
    pub cache_bytes: i64,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "HIVECACHE_REPLICAS", default_value_t = 50)]
    pub replicas: usize,

    /// Serve the public API in addition to the peer protocol
    #[arg(long, env = "HIVECACHE_API", default_value_t = true, action = clap::ArgAction::Set)]
    pub api: bool,

    /// Protection window for freshly written LFU entries, in milliseconds
    #[arg(long, env = "HIVECACHE_LFU_PROTECTION_MS", default_value_t = 5)]
    pub lfu_protection_ms: u64,
}

impl Config {
    /// The address this node advertises to its peers.
    pub fn advertise_addr(&self) -> String {
        self.self_addr
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    /// Engine options for the groups of this process. Engines are built
    /// unbounded; the per-group combined budget does the bounding.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            strategy: self.cache_strategy,
            max_bytes: 0,
            lfu_protection: Duration::from_millis(self.lfu_protection_ms),
        }
    }
}
