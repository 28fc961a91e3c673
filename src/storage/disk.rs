use crate::error::{KvError, KvResult};
use crate::storage::{Clearer, KeyList, Store};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::warn;

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord {
    key: String,
    value: Vec<u8>,
}

/// Directory-backed store holding one file per key.
pub struct DiskStore {
    data_dir: PathBuf,
}

impl DiskStore {
    pub async fn new<P: AsRef<Path>>(data_dir: P) -> KvResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        // Create data directory if it doesn't exist
        if !data_dir.exists() {
            async_fs::create_dir_all(&data_dir).await?;
        }

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // Keys may contain path separators, so files are named by key digest.
    fn record_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut file_name = String::with_capacity(digest.len() * 2 + RECORD_EXTENSION.len() + 1);
        for byte in digest.iter() {
            let _ = write!(file_name, "{:02x}", byte);
        }
        file_name.push('.');
        file_name.push_str(RECORD_EXTENSION);
        self.data_dir.join(file_name)
    }

    // Unique sibling of the record file
    fn temp_path(record_path: &Path) -> PathBuf {
        let suffix: u64 = rand::random();
        let extension = format!("{}.{:016x}.{}", RECORD_EXTENSION, suffix, TEMP_EXTENSION);
        record_path.with_extension(extension)
    }

    async fn read_record(path: &Path) -> KvResult<DiskRecord> {
        let data = async_fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => KvError::NotFound,
            _ => KvError::Io(e),
        })?;
        serde_json::from_slice(&data).map_err(|e| KvError::InvalidDataFormat(e.to_string()))
    }

    async fn record_paths(&self) -> KvResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir_entries = async_fs::read_dir(&self.data_dir).await?;

        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
            {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

#[async_trait]
impl Store for DiskStore {
    async fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let record = DiskRecord {
            key: key.to_string(),
            value: value.to_vec(),
        };
        let serialized = serde_json::to_vec(&record)?;

        // Readers only ever see a complete old or new record
        let path = self.record_path(key);
        let temp_path = Self::temp_path(&path);
        if let Err(e) = async_fs::write(&temp_path, serialized).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = async_fs::rename(&temp_path, &path).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> KvResult<Vec<u8>> {
        let record = Self::read_record(&self.record_path(key)).await?;
        if record.key != key {
            return Err(KvError::Storage {
                message: format!("record for {} holds key {}", key, record.key),
            });
        }
        Ok(record.value)
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        match async_fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyList for DiskStore {
    async fn keys(&self) -> KvResult<Vec<String>> {
        let mut keys = Vec::new();

        for path in self.record_paths().await? {
            match Self::read_record(&path).await {
                Ok(record) => keys.push(record.key),
                // Removed between listing and reading
                Err(KvError::NotFound) => {}
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl Clearer for DiskStore {
    async fn clear(&self) -> KvResult<()> {
        for path in self.record_paths().await? {
            match async_fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
