use crate::error::{KvError, KvResult};
use crate::storage::{Clearer, KeyList, Store};
use async_trait::async_trait;
use std::path::Path;

/// Store backed by a sled embedded database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: ::sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> KvResult<Self> {
        let db = ::sled::open(path)?;
        Ok(Self { db })
    }

    pub fn temporary() -> KvResult<Self> {
        let db = ::sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &::sled::Db {
        &self.db
    }
}

#[async_trait]
impl Store for SledStore {
    async fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(value.to_vec()),
            None => Err(KvError::NotFound),
        }
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    async fn close(&self) -> KvResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl KeyList for SledStore {
    async fn keys(&self) -> KvResult<Vec<String>> {
        let mut keys = Vec::new();
        for key in self.db.iter().keys() {
            keys.push(String::from_utf8_lossy(&key?).into_owned());
        }
        Ok(keys)
    }
}

#[async_trait]
impl Clearer for SledStore {
    async fn clear(&self) -> KvResult<()> {
        self.db.clear()?;
        Ok(())
    }
}
