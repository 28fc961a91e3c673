use crate::cluster::Node;
use crate::error::{KvError, KvResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    /// `set` returns once the first replica holds the value; the rest are
    /// written in the background.
    #[default]
    Async,
    /// `set` returns once every replica holds the value.
    Sync,
}

impl fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationMode::Async => write!(f, "async"),
            ReplicationMode::Sync => write!(f, "sync"),
        }
    }
}

impl FromStr for ReplicationMode {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" | "asynchronous" => Ok(ReplicationMode::Async),
            "sync" | "synchronous" => Ok(ReplicationMode::Sync),
            other => Err(KvError::InvalidArgument(format!(
                "unknown replication mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationPolicy {
    pub factor: usize,
    pub mode: ReplicationMode,
}

impl Default for ReplicationPolicy {
    fn default() -> Self {
        Self {
            factor: 1,
            mode: ReplicationMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Set(Arc<[u8]>),
    Del,
}

impl WriteOp {
    fn name(&self) -> &'static str {
        match self {
            WriteOp::Set(_) => "set",
            WriteOp::Del => "del",
        }
    }

    async fn apply(&self, node: &Node, key: &str) -> KvResult<()> {
        match self {
            WriteOp::Set(value) => node.store.set(key, value).await,
            WriteOp::Del => node.store.del(key).await,
        }
    }
}

/// Applies `op` to every node concurrently and waits for all of them.
///
/// Returns the first failure observed. Writes that already landed on other
/// nodes are left in place.
pub(crate) async fn fan_out(nodes: Vec<Node>, key: Arc<str>, op: WriteOp) -> KvResult<()> {
    let mut tasks = JoinSet::new();

    for node in nodes {
        let key = Arc::clone(&key);
        let op = op.clone();
        tasks.spawn(async move {
            let result = op.apply(&node, &key).await;
            (node.name, result)
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let error = match joined {
            Ok((_, Ok(()))) => continue,
            Ok((name, Err(e))) => {
                debug!("Replica {} failed {} for key {}: {}", name, op.name(), key, e);
                e
            }
            Err(e) => KvError::Replication(format!("{} task failed: {}", op.name(), e)),
        };
        first_error.get_or_insert(error);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Detached secondary writes issued by asynchronous `set` calls.
///
/// Tasks keep running if the tracker is dropped; errors are logged and
/// otherwise discarded.
#[derive(Debug, Default)]
pub(crate) struct BackgroundReplication {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundReplication {
    pub(crate) fn spawn(&self, node: Node, key: Arc<str>, value: Arc<[u8]>) {
        let handle = tokio::spawn(async move {
            if let Err(e) = node.store.set(&key, &value).await {
                debug!("Background replication of {} to {} failed: {}", key, node.name, e);
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    pub(crate) fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }

    pub(crate) async fn wait(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    debug!("Background replication task failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Store};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl Store for BrokenStore {
        async fn set(&self, _key: &str, _value: &[u8]) -> KvResult<()> {
            Err(KvError::Storage {
                message: "disk full".to_string(),
            })
        }

        async fn get(&self, _key: &str) -> KvResult<Vec<u8>> {
            Err(KvError::NotFound)
        }

        async fn del(&self, _key: &str) -> KvResult<()> {
            Err(KvError::Storage {
                message: "read only".to_string(),
            })
        }
    }

    #[test]
    fn test_replication_mode_parsing() {
        assert_eq!("sync".parse::<ReplicationMode>().unwrap(), ReplicationMode::Sync);
        assert_eq!(" ASYNC ".parse::<ReplicationMode>().unwrap(), ReplicationMode::Async);
        assert!("eventually".parse::<ReplicationMode>().is_err());
        assert_eq!(ReplicationMode::Sync.to_string(), "sync");
        assert_eq!(ReplicationPolicy::default().factor, 1);
    }

    #[tokio::test]
    async fn test_fan_out_writes_every_node() {
        let a = Arc::new(MemoryStore::new());
        let b = Arc::new(MemoryStore::new());
        let nodes = vec![Node::new("a", a.clone()), Node::new("b", b.clone())];

        fan_out(nodes, Arc::from("foo"), WriteOp::Set(Arc::from(&b"bar"[..])))
            .await
            .unwrap();

        assert_eq!(a.get("foo").await.unwrap(), b"bar");
        assert_eq!(b.get("foo").await.unwrap(), b"bar");
    }

    #[tokio::test]
    async fn test_fan_out_reports_failure_without_rollback() {
        let good = Arc::new(MemoryStore::new());
        let nodes = vec![Node::new("good", good.clone()), Node::new("bad", Arc::new(BrokenStore))];

        let err = fan_out(nodes, Arc::from("foo"), WriteOp::Set(Arc::from(&b"bar"[..])))
            .await
            .unwrap_err();

        assert!(matches!(err, KvError::Storage { .. }));
        assert_eq!(good.get("foo").await.unwrap(), b"bar");
    }

    #[tokio::test]
    async fn test_background_replication_wait() {
        let tracker = BackgroundReplication::default();
        let store = Arc::new(MemoryStore::new());

        let value: Arc<[u8]> = Arc::from(&b"bar"[..]);
        tracker.spawn(Node::new("a", store.clone()), Arc::from("foo"), value.clone());
        tracker.spawn(Node::new("bad", Arc::new(BrokenStore)), Arc::from("foo"), value);
        tracker.wait().await;

        assert_eq!(tracker.pending(), 0);
        assert_eq!(store.get("foo").await.unwrap(), b"bar");
    }
}
