use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("not found")]
    NotFound,

    #[error("not enough nodes: requested {requested}, available {available}")]
    Unavailable { requested: usize, available: usize },

    #[error("node already exists: {0}")]
    AlreadyExists(String),

    #[error("node does not exist: {0}")]
    DoesNotExist(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid data format: {0}")]
    InvalidDataFormat(String),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Replication error: {0}")]
    Replication(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),
}

impl KvError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, KvError::Unavailable { .. })
    }
}

pub type KvResult<T> = Result<T, KvError>;
