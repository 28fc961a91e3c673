pub mod cluster;
pub mod codec;
pub mod error;
pub mod key;
pub mod storage;

pub use cluster::{HashRing, ReplicationClient, ReplicationMode, ReplicationPolicy};
pub use codec::{Codec, JsonCodec};
pub use error::{KvError, KvResult};
pub use key::{Key, KeyProvider};
pub use storage::{Clearer, KeyList, Store};

use cluster::ring::DEFAULT_VIRTUAL_NODES;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RingKvConfig {
    /// Initial replication factor. It is not checked against the node count,
    /// so writes fail `Unavailable` until at least this many nodes are added.
    pub replication_factor: usize,
    pub replication_mode: ReplicationMode,
    pub virtual_nodes: usize,
    pub data_dir: String,
}

impl Default for RingKvConfig {
    fn default() -> Self {
        Self {
            replication_factor: 1,
            replication_mode: ReplicationMode::Async,
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            data_dir: "./ringkv_data".to_string(),
        }
    }
}

impl RingKvConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(factor_str) = std::env::var("REPLICATION_FACTOR") {
            match factor_str.parse::<usize>() {
                Ok(factor) if factor > 0 => config.replication_factor = factor,
                _ => warn!("Ignoring invalid REPLICATION_FACTOR: {}", factor_str),
            }
        }

        if let Ok(mode_str) = std::env::var("REPLICATION_MODE") {
            match mode_str.parse() {
                Ok(mode) => config.replication_mode = mode,
                Err(e) => warn!("Ignoring REPLICATION_MODE: {}", e),
            }
        }

        if let Ok(vnodes_str) = std::env::var("VIRTUAL_NODES") {
            match vnodes_str.parse::<usize>() {
                Ok(vnodes) if vnodes > 0 => config.virtual_nodes = vnodes,
                _ => warn!("Ignoring invalid VIRTUAL_NODES: {}", vnodes_str),
            }
        }

        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            config.data_dir = data_dir;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        std::env::set_var("REPLICATION_FACTOR", "3");
        std::env::set_var("REPLICATION_MODE", "sync");
        std::env::set_var("VIRTUAL_NODES", "not-a-number");
        std::env::set_var("DATA_DIR", "/tmp/ringkv-test");

        let config = RingKvConfig::from_env();
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.replication_mode, ReplicationMode::Sync);
        assert_eq!(config.virtual_nodes, DEFAULT_VIRTUAL_NODES);
        assert_eq!(config.data_dir, "/tmp/ringkv-test");

        std::env::set_var("REPLICATION_FACTOR", "0");
        assert_eq!(RingKvConfig::from_env().replication_factor, 1);
    }
}
