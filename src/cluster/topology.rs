use crate::cluster::replication::{ReplicationMode, ReplicationPolicy};
use crate::cluster::{HashRing, Node};
use crate::error::{KvError, KvResult};
use crate::storage::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Node registry, ring and replication policy.
///
/// These are only ever mutated together, through `&mut self`, so a node
/// name is either in both the registry and the ring or in neither.
#[derive(Debug)]
pub(crate) struct Topology {
    nodes: HashMap<String, Node>,
    ring: HashRing,
    policy: ReplicationPolicy,
}

impl Topology {
    pub(crate) fn new(virtual_nodes: usize, policy: ReplicationPolicy) -> Self {
        Self {
            nodes: HashMap::new(),
            ring: HashRing::new(virtual_nodes),
            policy: ReplicationPolicy {
                factor: policy.factor.max(1),
                mode: policy.mode,
            },
        }
    }

    pub(crate) fn add_node(&mut self, name: &str, store: Arc<dyn Store>) -> KvResult<()> {
        if self.nodes.contains_key(name) {
            return Err(KvError::AlreadyExists(name.to_string()));
        }
        self.set_node(name, store)
    }

    pub(crate) fn set_node(&mut self, name: &str, store: Arc<dyn Store>) -> KvResult<()> {
        if name.is_empty() {
            return Err(KvError::InvalidArgument("node name is empty".to_string()));
        }
        self.nodes.insert(name.to_string(), Node::new(name, store));
        self.ring.add(name);
        Ok(())
    }

    pub(crate) fn replace_node(&mut self, name: &str, store: Arc<dyn Store>) -> KvResult<()> {
        if !self.nodes.contains_key(name) {
            return Err(KvError::DoesNotExist(name.to_string()));
        }
        self.set_node(name, store)
    }

    pub(crate) fn remove_node(&mut self, name: &str) -> Option<Node> {
        self.ring.remove(name);
        self.nodes.remove(name)
    }

    pub(crate) fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub(crate) fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn all_nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn ring(&self) -> &HashRing {
        &self.ring
    }

    pub(crate) fn policy(&self) -> ReplicationPolicy {
        self.policy
    }

    pub(crate) fn set_replication_mode(&mut self, mode: ReplicationMode) {
        self.policy.mode = mode;
    }

    pub(crate) fn set_replication_factor(&mut self, factor: usize) -> KvResult<()> {
        if factor == 0 {
            return Err(KvError::InvalidArgument(
                "replication factor must be at least 1".to_string(),
            ));
        }
        if factor > self.ring.len() {
            return Err(KvError::InvalidArgument(format!(
                "replication factor {} exceeds node count {}",
                factor,
                self.ring.len()
            )));
        }
        self.policy.factor = factor;
        Ok(())
    }

    /// Exactly `factor` nodes in ring priority order, or `Unavailable`.
    pub(crate) fn write_targets(&self, key: &str) -> KvResult<Vec<Node>> {
        let names = self.ring.get_n(key, self.policy.factor)?;
        self.resolve(names)
    }

    /// Up to `factor` nodes in ring priority order; `Unavailable` only when
    /// no node is registered.
    pub(crate) fn read_targets(&self, key: &str) -> KvResult<Vec<Node>> {
        let n = self.policy.factor.min(self.ring.len()).max(1);
        let names = self.ring.get_n(key, n)?;
        self.resolve(names)
    }

    fn resolve(&self, names: Vec<String>) -> KvResult<Vec<Node>> {
        names
            .into_iter()
            .map(|name| {
                self.nodes.get(&name).cloned().ok_or_else(|| KvError::Storage {
                    message: format!("ring member {} has no registered store", name),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ring::DEFAULT_VIRTUAL_NODES;
    use crate::storage::MemoryStore;

    fn topology() -> Topology {
        Topology::new(DEFAULT_VIRTUAL_NODES, ReplicationPolicy::default())
    }

    fn store() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new())
    }

    fn assert_consistent(topology: &Topology) {
        assert_eq!(topology.node_names(), topology.ring().members());
    }

    #[test]
    fn test_node_lifecycle() {
        let mut topology = topology();

        assert!(matches!(
            topology.replace_node("node-01", store()),
            Err(KvError::DoesNotExist(_))
        ));
        topology.add_node("node-01", store()).unwrap();
        topology.replace_node("node-01", store()).unwrap();
        assert!(matches!(
            topology.add_node("node-01", store()),
            Err(KvError::AlreadyExists(_))
        ));
        topology.set_node("node-01", store()).unwrap();
        topology.set_node("node-02", store()).unwrap();
        assert_consistent(&topology);
        assert_eq!(topology.len(), 2);

        assert!(topology.remove_node("node-01").is_some());
        assert!(topology.remove_node("node-01").is_none());
        assert_consistent(&topology);
        assert_eq!(topology.node_names(), vec!["node-02"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut topology = topology();
        assert!(matches!(
            topology.add_node("", store()),
            Err(KvError::InvalidArgument(_))
        ));
        assert_eq!(topology.len(), 0);
        assert_consistent(&topology);
    }

    #[test]
    fn test_replication_factor_bounds() {
        let mut topology = topology();
        assert!(matches!(
            topology.set_replication_factor(1),
            Err(KvError::InvalidArgument(_))
        ));

        topology.add_node("a", store()).unwrap();
        topology.add_node("b", store()).unwrap();
        topology.set_replication_factor(2).unwrap();
        assert_eq!(topology.policy().factor, 2);

        assert!(topology.set_replication_factor(3).is_err());
        assert!(topology.set_replication_factor(0).is_err());
        assert_eq!(topology.policy().factor, 2);
    }

    #[test]
    fn test_targets_after_shrinking() {
        let mut topology = topology();
        topology.add_node("a", store()).unwrap();
        topology.add_node("b", store()).unwrap();
        topology.set_replication_factor(2).unwrap();
        assert_eq!(topology.write_targets("foo").unwrap().len(), 2);

        topology.remove_node("a");
        assert!(topology.write_targets("foo").unwrap_err().is_unavailable());

        let readers = topology.read_targets("foo").unwrap();
        assert_eq!(readers.len(), 1);
        assert_eq!(readers[0].name, "b");

        topology.remove_node("b");
        assert!(topology.read_targets("foo").unwrap_err().is_unavailable());
    }
}
