//! Peer Contracts
//!
//! The group orchestrator fetches remotely-owned keys through these two
//! traits and does not care whether the transport behind them is HTTP, an
//! RPC framework or an in-process stub.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// == Peer Picker ==
/// Picks the peer owning a key. `None` means the key is owned locally or
/// no peers are configured, and the caller should fall back to its own
/// source.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

// == Peer Getter ==
/// A synchronous-looking remote fetch: asks one peer for one key of one
/// group and returns the raw value bytes.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;
}
