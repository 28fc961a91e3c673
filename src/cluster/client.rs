use crate::cluster::replication::{fan_out, BackgroundReplication, ReplicationMode, WriteOp};
use crate::cluster::ring::DEFAULT_VIRTUAL_NODES;
use crate::cluster::topology::Topology;
use crate::cluster::{Node, ReplicationPolicy};
use crate::codec::{Codec, JsonCodec};
use crate::error::{KvError, KvResult};
use crate::key::KeyProvider;
use crate::storage::Store;
use crate::RingKvConfig;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Replicates keys across a set of named stores chosen by a consistent
/// hash ring.
///
/// Every operation takes a snapshot of the registry and ring under a read
/// lock and releases it before touching any store. Node and policy changes
/// take the write lock.
pub struct ReplicationClient<C: Codec = JsonCodec> {
    topology: RwLock<Topology>,
    background: BackgroundReplication,
    codec: C,
}

impl ReplicationClient<JsonCodec> {
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }

    /// Builds an empty client from `config`. The configured factor takes
    /// effect as-is; writes need that many nodes to be registered.
    pub fn with_config(config: &RingKvConfig) -> Self {
        let policy = ReplicationPolicy {
            factor: config.replication_factor,
            mode: config.replication_mode,
        };
        Self::build(config.virtual_nodes, policy, JsonCodec)
    }
}

impl Default for ReplicationClient<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> ReplicationClient<C> {
    pub fn with_codec(codec: C) -> Self {
        Self::build(DEFAULT_VIRTUAL_NODES, ReplicationPolicy::default(), codec)
    }

    fn build(virtual_nodes: usize, policy: ReplicationPolicy, codec: C) -> Self {
        Self {
            topology: RwLock::new(Topology::new(virtual_nodes, policy)),
            background: BackgroundReplication::default(),
            codec,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Registers a node, failing if the name is already taken.
    pub async fn add_node(&self, name: &str, store: Arc<dyn Store>) -> KvResult<()> {
        self.topology.write().await.add_node(name, store)?;
        info!("Added node {}", name);
        Ok(())
    }

    /// Registers a node, replacing any existing node with the same name.
    pub async fn set_node(&self, name: &str, store: Arc<dyn Store>) -> KvResult<()> {
        self.topology.write().await.set_node(name, store)?;
        info!("Set node {}", name);
        Ok(())
    }

    /// Replaces the store of an already registered node.
    pub async fn replace_node(&self, name: &str, store: Arc<dyn Store>) -> KvResult<()> {
        self.topology.write().await.replace_node(name, store)?;
        info!("Replaced node {}", name);
        Ok(())
    }

    /// Unregisters a node. Removing an unknown name is not an error.
    pub async fn remove_node(&self, name: &str) -> KvResult<()> {
        let removed = self.topology.write().await.remove_node(name);
        if removed.is_some() {
            info!("Removed node {}", name);
        }
        Ok(())
    }

    pub async fn node(&self, name: &str) -> Option<Node> {
        self.topology.read().await.node(name).cloned()
    }

    pub async fn nodes(&self) -> Vec<String> {
        self.topology.read().await.node_names()
    }

    pub async fn node_count(&self) -> usize {
        self.topology.read().await.len()
    }

    pub async fn members(&self) -> Vec<String> {
        self.topology.read().await.ring().members()
    }

    pub async fn set_replication_mode(&self, mode: ReplicationMode) {
        self.topology.write().await.set_replication_mode(mode);
        debug!("Replication mode set to {}", mode);
    }

    pub async fn replication_mode(&self) -> ReplicationMode {
        self.topology.read().await.policy().mode
    }

    /// Sets how many nodes each key is written to. Fails if `factor` is zero
    /// or larger than the number of registered nodes.
    pub async fn set_replication_factor(&self, factor: usize) -> KvResult<()> {
        self.topology.write().await.set_replication_factor(factor)?;
        debug!("Replication factor set to {}", factor);
        Ok(())
    }

    pub async fn replication_factor(&self) -> usize {
        self.topology.read().await.policy().factor
    }

    /// Writes `value` to the replicas of `key`.
    ///
    /// In sync mode every replica is written concurrently and the first
    /// failure is returned; replicas that were already written keep the
    /// value. In async mode only the primary is awaited and the remaining
    /// writes run in the background with their errors discarded.
    pub async fn set<K>(&self, key: &K, value: &[u8]) -> KvResult<()>
    where
        K: KeyProvider + ?Sized,
    {
        let key: Arc<str> = Arc::from(&*key.key());
        let (targets, mode) = {
            let topology = self.topology.read().await;
            (topology.write_targets(&key)?, topology.policy().mode)
        };
        let value: Arc<[u8]> = Arc::from(value);

        match mode {
            ReplicationMode::Sync => fan_out(targets, key, WriteOp::Set(value)).await,
            ReplicationMode::Async => {
                let mut targets = targets.into_iter();
                let primary = targets.next().ok_or(KvError::Unavailable {
                    requested: 1,
                    available: 0,
                })?;
                let result = primary.store.set(&key, &value).await;

                for secondary in targets {
                    self.background
                        .spawn(secondary, Arc::clone(&key), Arc::clone(&value));
                }
                result
            }
        }
    }

    /// Reads `key` from its replicas one at a time in ring priority order.
    ///
    /// The first replica that answers wins. When every replica fails or lacks
    /// the key the result is `NotFound`, whatever the individual errors were.
    pub async fn get<K>(&self, key: &K) -> KvResult<Vec<u8>>
    where
        K: KeyProvider + ?Sized,
    {
        let key = key.key().into_owned();
        let targets = self.topology.read().await.read_targets(&key)?;

        for node in targets {
            match node.store.get(&key).await {
                Ok(value) => return Ok(value),
                Err(KvError::NotFound) => {}
                Err(e) => debug!("Replica {} failed get for key {}: {}", node.name, key, e),
            }
        }

        Err(KvError::NotFound)
    }

    /// Deletes `key` from all of its replicas concurrently.
    pub async fn del<K>(&self, key: &K) -> KvResult<()>
    where
        K: KeyProvider + ?Sized,
    {
        let key: Arc<str> = Arc::from(&*key.key());
        let targets = self.topology.read().await.read_targets(&key)?;
        fan_out(targets, key, WriteOp::Del).await
    }

    pub async fn set_value<K, T>(&self, key: &K, value: &T) -> KvResult<()>
    where
        K: KeyProvider + ?Sized,
        T: Serialize + ?Sized,
    {
        let bytes = self.codec.marshal(value)?;
        self.set(key, &bytes).await
    }

    pub async fn get_value<T, K>(&self, key: &K) -> KvResult<T>
    where
        T: DeserializeOwned,
        K: KeyProvider + ?Sized,
    {
        let bytes = self.get(key).await?;
        self.codec.unmarshal(&bytes)
    }

    /// Waits for every background write issued by asynchronous `set` calls.
    pub async fn wait_for_replication(&self) {
        self.background.wait().await;
    }

    pub fn pending_replication(&self) -> usize {
        self.background.pending()
    }

    /// Drains background replication, then closes every registered store.
    pub async fn close(&self) -> KvResult<()> {
        self.wait_for_replication().await;

        let nodes = self.topology.read().await.all_nodes();
        let mut first_error = None;
        for node in nodes {
            if let Err(e) = node.store.close().await {
                warn!("Failed to close node {}: {}", node.name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<C: Codec> Store for ReplicationClient<C> {
    async fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        ReplicationClient::set(self, key, value).await
    }

    async fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        ReplicationClient::get(self, key).await
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        ReplicationClient::del(self, key).await
    }

    async fn close(&self) -> KvResult<()> {
        ReplicationClient::close(self).await
    }
}
