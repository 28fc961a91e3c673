use crate::error::{KvError, KvResult};
use serde::{de::DeserializeOwned, Serialize};

/// Turns typed values into the bytes a `Store` holds, and back.
pub trait Codec: Send + Sync + 'static {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> KvResult<Vec<u8>>;

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> KvResult<T>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> KvResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> KvResult<T> {
        serde_json::from_slice(bytes).map_err(|e| KvError::InvalidDataFormat(e.to_string()))
    }
}
