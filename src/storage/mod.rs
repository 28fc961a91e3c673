pub mod disk;
pub mod memory;
pub mod sled;

pub use self::disk::DiskStore;
pub use self::memory::MemoryStore;
pub use self::sled::SledStore;

use crate::error::{KvError, KvResult};
use async_trait::async_trait;
use tracing::debug;

/// Common contract every backing engine is adapted to.
///
/// Values are opaque bytes; typed values are encoded by a `Codec` before
/// they reach a store. `get` must return `KvError::NotFound` for an absent
/// key, and `del` of an absent key succeeds.
#[async_trait]
pub trait Store: Send + Sync {
    async fn set(&self, key: &str, value: &[u8]) -> KvResult<()>;

    async fn get(&self, key: &str) -> KvResult<Vec<u8>>;

    async fn del(&self, key: &str) -> KvResult<()>;

    async fn close(&self) -> KvResult<()> {
        Ok(())
    }
}

/// Stores that can enumerate their keys.
#[async_trait]
pub trait KeyList: Send + Sync {
    async fn keys(&self) -> KvResult<Vec<String>>;
}

/// Stores that can drop every key at once.
#[async_trait]
pub trait Clearer: Send + Sync {
    async fn clear(&self) -> KvResult<()>;
}

/// Copies every key of `src` into `dst`, returning how many were copied.
///
/// Keys deleted from `src` while the copy runs are skipped.
pub async fn transfer<S>(src: &S, dst: &dyn Store) -> KvResult<usize>
where
    S: Store + KeyList + ?Sized,
{
    let mut copied = 0;

    for key in src.keys().await? {
        let value = match src.get(&key).await {
            Ok(value) => value,
            Err(KvError::NotFound) => {
                debug!("Key {} vanished during transfer", key);
                continue;
            }
            Err(e) => return Err(e),
        };
        dst.set(&key, &value).await?;
        copied += 1;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transfer_copies_all_keys() {
        let src = MemoryStore::new();
        let dst = MemoryStore::new();

        src.set("a", b"1").await.unwrap();
        src.set("b", b"2").await.unwrap();
        dst.set("c", b"3").await.unwrap();

        let copied = transfer(&src, &dst).await.unwrap();
        assert_eq!(copied, 2);

        assert_eq!(dst.get("a").await.unwrap(), b"1");
        assert_eq!(dst.get("b").await.unwrap(), b"2");
        assert_eq!(dst.get("c").await.unwrap(), b"3");
    }

    #[tokio::test]
    async fn test_transfer_from_empty_store() {
        let src = MemoryStore::new();
        let dst = MemoryStore::new();

        assert_eq!(transfer(&src, &dst).await.unwrap(), 0);
        assert!(dst.is_empty().await);
    }
}
