//! HTTP Peer Pool
//!
//! The transport side of the peer contracts: an [`HttpPool`] keeps a
//! consistent-hash ring over the configured peer base URLs and hands out
//! one [`HttpGetter`] per peer. Changing the peer set rebuilds the ring
//! wholesale rather than diffing it.
//!
//! The wire protocol is deliberately plain: a peer answers
//! `GET {base}/_hive/{group}/{key}` with the raw value bytes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{GroupError, Result};
use crate::peers::{PeerGetter, PeerPicker};
use crate::ring::HashRing;

// == Public Constants ==
/// URL prefix of the peer-to-peer endpoint.
pub const DEFAULT_BASE_PATH: &str = "/_hive/";

/// Virtual nodes per peer on the ring.
pub const DEFAULT_REPLICAS: usize = 50;

// == HTTP Pool ==
/// Picks owning peers for keys and fetches from them over HTTP.
pub struct HttpPool {
    /// This node's own base URL, e.g. `http://localhost:5658`.
    self_addr: String,
    replicas: usize,
    state: Mutex<PoolState>,
}

struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

impl HttpPool {
    /// Creates a pool for the node reachable at `self_addr`.
    pub fn new(self_addr: impl Into<String>) -> Self {
        Self::with_replicas(self_addr, DEFAULT_REPLICAS)
    }

    /// Creates a pool with a custom virtual-node count.
    pub fn with_replicas(self_addr: impl Into<String>, replicas: usize) -> Self {
        Self {
            self_addr: self_addr.into(),
            replicas,
            state: Mutex::new(PoolState {
                ring: HashRing::new(replicas, None),
                getters: HashMap::new(),
            }),
        }
    }

    /// Replaces the peer set: a fresh ring is built from `peers` and each
    /// peer gets an HTTP client. The list should include this node's own
    /// address so that other nodes' rings agree with ours.
    pub fn set_peers<S: Into<String>>(&self, peers: impl IntoIterator<Item = S>) {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();
        let mut ring = HashRing::new(self.replicas, None);
        ring.add(peers.iter().cloned());

        let client = reqwest::Client::new();
        let getters = peers
            .into_iter()
            .map(|peer| {
                let getter = Arc::new(HttpGetter {
                    base_url: format!("{}{}", peer, DEFAULT_BASE_PATH),
                    client: client.clone(),
                });
                (peer, getter)
            })
            .collect();

        let mut state = self.state.lock().unwrap();
        state.ring = ring;
        state.getters = getters;
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.lock().unwrap();
        let owner = state.ring.get(key)?;
        if owner == self.self_addr {
            return None;
        }
        debug!(key, peer = owner, "picked remote peer");
        state
            .getters
            .get(owner)
            .cloned()
            .map(|getter| getter as Arc<dyn PeerGetter>)
    }
}

// == HTTP Getter ==
/// Fetches one group/key from one peer.
pub struct HttpGetter {
    base_url: String,
    client: reqwest::Client,
}

#[async_trait]
impl PeerGetter for HttpGetter {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key),
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| GroupError::Peer(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GroupError::Peer(format!(
                "peer returned {}",
                response.status()
            )));
        }

        let bts = response
            .bytes()
            .await
            .map_err(|err| GroupError::Peer(err.to_string()))?;
        Ok(bts.to_vec())
    }
}
