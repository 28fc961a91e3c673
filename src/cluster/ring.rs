use crate::error::{KvError, KvResult};
use byteorder::{BigEndian, ByteOrder};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const DEFAULT_VIRTUAL_NODES: usize = 150;

pub(crate) fn hash_key(key: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();

    // First 8 bytes of the digest
    BigEndian::read_u64(&result[..8])
}

#[derive(Debug, Clone)]
pub struct HashRing {
    points: BTreeMap<u64, String>,
    members: BTreeSet<String>,
    virtual_nodes: usize,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_VIRTUAL_NODES)
    }
}

impl HashRing {
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            points: BTreeMap::new(),
            members: BTreeSet::new(),
            virtual_nodes: virtual_nodes.max(1),
        }
    }

    pub fn add(&mut self, name: &str) {
        if !self.members.insert(name.to_string()) {
            return;
        }

        for i in 0..self.virtual_nodes {
            let point = hash_key(&format!("{}:{}", name, i));
            // On a collision the earlier member keeps the point.
            self.points.entry(point).or_insert_with(|| name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) {
        if !self.members.remove(name) {
            return;
        }
        self.points.retain(|_, member| member != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let hash = hash_key(key);

        // Find the first point with hash >= key hash, wrapping to the start
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, name)| name.as_str())
    }

    /// Returns `n` distinct members in priority order for `key`.
    pub fn get_n(&self, key: &str, n: usize) -> KvResult<Vec<String>> {
        if self.members.is_empty() || self.members.len() < n {
            return Err(KvError::Unavailable {
                requested: n,
                available: self.members.len(),
            });
        }

        let hash = hash_key(key);
        let mut nodes = Vec::with_capacity(n);
        let mut seen = HashSet::new();

        for (_, name) in self.points.range(hash..).chain(self.points.range(..hash)) {
            if nodes.len() >= n {
                break;
            }
            if seen.insert(name.as_str()) {
                nodes.push(name.clone());
            }
        }

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with(names: &[&str]) -> HashRing {
        let mut ring = HashRing::new(DEFAULT_VIRTUAL_NODES);
        for name in names {
            ring.add(name);
        }
        ring
    }

    #[test]
    fn test_get_n_returns_distinct_members() {
        let ring = ring_with(&["a", "b", "c"]);

        let nodes = ring.get_n("cpu.usage.total", 2).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_ne!(nodes[0], nodes[1]);
        assert_eq!(Some(nodes[0].as_str()), ring.get("cpu.usage.total"));

        let all = ring.get_n("cpu.usage.total", 3).unwrap();
        assert_eq!(&all[..2], &nodes[..]);
    }

    #[test]
    fn test_get_n_insufficient_members() {
        let ring = ring_with(&["a"]);
        let err = ring.get_n("foo", 2).unwrap_err();
        assert!(matches!(
            err,
            KvError::Unavailable {
                requested: 2,
                available: 1
            }
        ));

        let empty = HashRing::default();
        assert!(empty.get_n("foo", 0).unwrap_err().is_unavailable());
        assert!(empty.get("foo").is_none());
    }

    #[test]
    fn test_node_removal() {
        let mut ring = ring_with(&["a", "b", "c"]);
        assert_eq!(ring.members(), vec!["a", "b", "c"]);

        ring.remove("b");
        assert_eq!(ring.members(), vec!["a", "c"]);
        assert!(!ring.contains("b"));

        for i in 0..100 {
            let nodes = ring.get_n(&format!("key-{}", i), 2).unwrap();
            assert!(!nodes.contains(&"b".to_string()));
        }

        // Removing twice is a no-op
        ring.remove("b");
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut ring = ring_with(&["a"]);
        let points = ring.points.len();
        ring.add("a");
        assert_eq!(ring.points.len(), points);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_placement_is_stable() {
        let ring1 = ring_with(&["a", "b", "c"]);
        let ring2 = ring_with(&["c", "b", "a"]);

        for i in 0..50 {
            let key = format!("series.{}", i);
            assert_eq!(ring1.get_n(&key, 3).unwrap(), ring2.get_n(&key, 3).unwrap());
        }
    }

    #[test]
    fn test_removal_only_remaps_removed_keys() {
        let before = ring_with(&["a", "b", "c", "d"]);
        let mut after = before.clone();
        after.remove("d");

        for i in 0..200 {
            let key = format!("k{}", i);
            let owner = before.get(&key).unwrap();
            if owner != "d" {
                assert_eq!(after.get(&key), Some(owner));
            }
        }
    }
}
