//! Consistent Hash Ring
//!
//! Maps cache keys to owning peers. Each peer is projected onto the ring as
//! `replicas` virtual points so that keys spread evenly across a small
//! number of physical peers and membership changes only move about
//! `1/peer_count` of the keys.
//!
//! The node that receives a request uses a structurally identical ring to
//! decide whether it owns the key itself or should forward it.

use std::collections::HashMap;

// == Hash Function ==
/// Ring hash function; the default is CRC-32 (IEEE) over the key bytes.
/// Tests substitute a deterministic function.
pub type HashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

// == Hash Ring ==
pub struct HashRing {
    replicas: usize,
    hash: HashFn,
    /// Sorted virtual points, kept in lockstep with `owners`.
    points: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring with `replicas` virtual points per owner.
    /// Passing `None` for `hash` selects CRC-32.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            replicas,
            hash: hash.unwrap_or_else(|| Box::new(|bts| crc32fast::hash(bts))),
            points: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Registers owners on the ring: each gains `replicas` virtual points
    /// hashed from `{replica_index}{owner}`, and the point set is re-sorted.
    pub fn add<S: Into<String>>(&mut self, owners: impl IntoIterator<Item = S>) {
        for owner in owners {
            let owner = owner.into();
            for i in 0..self.replicas {
                let point = (self.hash)(format!("{}{}", i, owner).as_bytes());
                self.points.push(point);
                self.owners.insert(point, owner.clone());
            }
        }
        self.points.sort_unstable();
        self.points.dedup();
    }

    /// Returns the owner of `key`: the owner of the first virtual point at
    /// or after `hash(key)`, wrapping around the ring. `None` when empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let hashed = (self.hash)(key.as_bytes());
        let idx = self.points.partition_point(|&p| p < hashed) % self.points.len();
        self.owners.get(&self.points[idx]).map(String::as_str)
    }

    /// Number of virtual points currently on the ring.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    /// Keys and owners are decimal integers and hash to themselves, so the
    /// ring layout is fully predictable.
    fn identity_ring() -> HashRing {
        HashRing::new(
            3,
            Some(Box::new(|bts: &[u8]| {
                std::str::from_utf8(bts).unwrap().parse::<u32>().unwrap()
            })),
        )
    }

    #[test]
    fn test_ring_deterministic_mapping() {
        let mut ring = identity_ring();
        // Virtual points: 02/12/22, 04/14/24, 06/16/26
        ring.add(["6", "4", "2"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, owner) in cases {
            assert_eq!(ring.get(key), Some(owner), "key {}", key);
        }
    }

    #[test]
    fn test_ring_add_rebalances() {
        let mut ring = identity_ring();
        ring.add(["6", "4", "2"]);
        assert_eq!(ring.get("27"), Some("2"));

        // 8 contributes points 08/18/28, capturing 27
        ring.add(["8"]);
        assert_eq!(ring.get("27"), Some("8"));
        assert_eq!(ring.get("2"), Some("2"));
        assert_eq!(ring.get("11"), Some("2"));
        assert_eq!(ring.get("23"), Some("4"));
    }

    #[test]
    fn test_ring_wraps_past_highest_point() {
        let mut ring = identity_ring();
        ring.add(["6", "4", "2"]);
        // 27 > 26, the highest point, so it wraps to the lowest (02 -> "2")
        assert_eq!(ring.get("27"), Some("2"));
    }

    #[test]
    fn test_ring_empty_returns_none() {
        let ring = HashRing::new(3, None);
        assert_eq!(ring.get("1"), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_default_hash_is_consistent() {
        let mut a = HashRing::new(50, None);
        let mut b = HashRing::new(50, None);
        a.add(["peer-1", "peer-2", "peer-3"]);
        b.add(["peer-1", "peer-2", "peer-3"]);
        for key in ["alpha", "beta", "gamma", "delta"] {
            assert_eq!(a.get(key), b.get(key));
        }
    }

    #[test]
    fn test_ring_replica_count() {
        let mut ring = HashRing::new(4, None);
        ring.add(["a", "b"]);
        assert_eq!(ring.len(), 8);
    }
}
