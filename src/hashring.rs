//! Consistent Hash Ring
//!
//! Maps keys to node identifiers. Each real node is placed on the ring `R`
//! times ("virtual nodes") to even out the key distribution when only a few
//! real nodes exist.
//!
//! # Design
//!
//! - Virtual node `i` of node `id` sits at `hash(format!("{i}{id}"))`
//! - A key belongs to the first virtual node at or after `hash(key)`,
//!   wrapping to the start of the ring
//! - Removing a node rebuilds the ring from the remaining members, so a
//!   point lost to a collision goes back to the node that lost it
//! - Not internally synchronized: membership changes need `&mut self`, so
//!   shared rings must be wrapped in a lock by the owner

use std::collections::{BTreeSet, HashMap};

/// Hash function used to place keys and virtual nodes on the ring
pub type HashFn = fn(&[u8]) -> u32;

/// Default number of virtual nodes per real node
pub const DEFAULT_REPLICAS: usize = 50;

/// Default ring hash (CRC-32C)
pub fn default_hash(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Consistent hash ring over string node identifiers
#[derive(Clone)]
pub struct HashRing {
    /// Hash function
    hash: HashFn,
    /// Virtual nodes per real node
    replicas: usize,
    /// Sorted virtual node hashes
    ring: Vec<u32>,
    /// Virtual node hash -> real node
    owners: HashMap<u32, String>,
    /// Real nodes, including any whose points were all lost to collisions
    members: BTreeSet<String>,
}

impl HashRing {
    /// Create an empty ring using the default hash
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, default_hash)
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            ring: Vec::new(),
            owners: HashMap::new(),
            members: BTreeSet::new(),
        }
    }

    /// Add real nodes to the ring
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            self.members.insert(node.to_string());
            self.place(node);
        }
        self.ring.sort_unstable();
    }

    /// Remove a real node and all of its virtual nodes
    pub fn remove(&mut self, node: &str) {
        if !self.members.remove(node) {
            return;
        }

        self.ring.clear();
        self.owners.clear();
        let members = std::mem::take(&mut self.members);
        for member in &members {
            self.place(member);
        }
        self.members = members;
        self.ring.sort_unstable();
    }

    /// Put the virtual nodes of `node` on the ring, unsorted
    fn place(&mut self, node: &str) {
        for i in 0..self.replicas {
            let point = (self.hash)(format!("{}{}", i, node).as_bytes());
            // Collisions resolve to the smaller id so ownership does not
            // depend on insertion order
            let claim = match self.owners.get(&point) {
                Some(owner) => node < owner.as_str(),
                None => {
                    self.ring.push(point);
                    true
                }
            };
            if claim {
                self.owners.insert(point, node.to_string());
            }
        }
    }

    /// Find the node that owns `key`, or `None` on an empty ring
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&point| point < hash);
        let point = self.ring[idx % self.ring.len()];
        self.owners.get(&point).map(String::as_str)
    }

    /// Real nodes on the ring, sorted
    pub fn nodes(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    /// Number of real nodes
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Virtual nodes per real node
    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.ring.len())
            .field("nodes", &self.nodes())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Interprets the bytes as a decimal number, so ring positions are predictable
    fn numeric_hash(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_hashing() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);

        // Virtual nodes 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(["6", "4", "2"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, owner) in cases {
            assert_eq!(ring.get(key), Some(owner), "asking for {}", key);
        }

        // Adds 8, 18, 28
        ring.add(["8"]);
        assert_eq!(ring.get("27"), Some("8"));
        assert_eq!(ring.get("2"), Some("2"));
        assert_eq!(ring.get("23"), Some("4"));
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new(10);
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
    }

    #[test]
    fn test_virtual_node_count() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);
        ring.add(["2", "4"]);
        assert_eq!(ring.ring.len(), 6);
        assert_eq!(ring.len(), 2);
        assert!(ring.ring.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_remove_node() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);
        ring.add(["2", "4", "6"]);
        ring.remove("4");

        assert_eq!(ring.nodes(), vec!["2".to_string(), "6".to_string()]);
        // 23 previously hit 24; the next point is now 26
        assert_eq!(ring.get("23"), Some("6"));
        assert_eq!(ring.get("11"), Some("2"));
    }

    #[test]
    fn test_collision_prefers_smaller_id() {
        fn constant(_: &[u8]) -> u32 {
            7
        }
        let mut a = HashRing::with_hasher(1, constant);
        a.add(["node-b", "node-a"]);
        let mut b = HashRing::with_hasher(1, constant);
        b.add(["node-a", "node-b"]);

        assert_eq!(a.get("key"), Some("node-a"));
        assert_eq!(b.get("key"), Some("node-a"));
    }

    #[test]
    fn test_remove_returns_collided_point() {
        fn constant(_: &[u8]) -> u32 {
            7
        }
        let mut ring = HashRing::with_hasher(1, constant);
        ring.add(["node-a", "node-b"]);
        ring.remove("node-a");

        let mut fresh = HashRing::with_hasher(1, constant);
        fresh.add(["node-b"]);

        assert_eq!(ring.nodes(), vec!["node-b".to_string()]);
        assert_eq!(ring.get("key"), Some("node-b"));
        assert_eq!(ring.get("key"), fresh.get("key"));
        assert_eq!(ring.ring, fresh.ring);
    }

    #[test]
    fn test_remove_unknown_node_is_noop() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);
        ring.add(["2", "4"]);
        ring.remove("9");
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.ring.len(), 6);
    }

    #[test]
    fn test_distribution_uses_all_nodes() {
        let mut ring = HashRing::default();
        ring.add(["http://a:8001", "http://b:8002", "http://c:8003"]);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..3000 {
            let key = format!("key-{}", i);
            let owner = ring.get(&key).unwrap().to_string();
            let owner = ring.nodes().into_iter().position(|n| n == owner).unwrap();
            *counts.entry(["a", "b", "c"][owner]).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c > 300));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: ownership depends only on the node set, not insertion order.
        #[test]
        fn prop_order_independent(
            nodes in prop::collection::hash_set("[a-z]{1,8}", 1..8),
            keys in prop::collection::vec(".{0,12}", 1..50),
        ) {
            let forward: Vec<String> = nodes.iter().cloned().collect();
            let mut backward = forward.clone();
            backward.reverse();

            let mut a = HashRing::new(20);
            a.add(&forward);
            let mut b = HashRing::new(20);
            b.add(&backward);

            for key in &keys {
                prop_assert_eq!(a.get(key), b.get(key));
                prop_assert_eq!(a.get(key), a.get(key));
            }
        }
    }
}
