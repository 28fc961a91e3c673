use crate::error::{KvError, KvResult};
use crate::storage::{Clearer, KeyList, Store};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.data.read().await.contains_key(key)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        let data = self.data.read().await;
        data.get(key).cloned().ok_or(KvError::NotFound)
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }
}

#[async_trait]
impl KeyList for MemoryStore {
    async fn keys(&self) -> KvResult<Vec<String>> {
        let data = self.data.read().await;
        Ok(data.keys().cloned().collect())
    }
}

#[async_trait]
impl Clearer for MemoryStore {
    async fn clear(&self) -> KvResult<()> {
        self.data.write().await.clear();
        Ok(())
    }
}
