//! Byte-oriented key-value backends.
//!
//! The store only needs single-key `get`/`set`; no transactions across keys
//! are assumed.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use fred::prelude::*;

use super::error::KvError;

/// External get/set-by-key byte store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the stored bytes, or `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Overwrites the value at `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), KvError>;
}

/// Redis-backed store. Every key is prefixed with `<namespace>:`.
#[derive(Clone)]
pub struct RedisKv {
    redis: Client,
    namespace: String,
}

impl RedisKv {
    pub fn new(redis: Client, namespace: impl Into<String>) -> Self {
        Self {
            redis,
            namespace: namespace.into(),
        }
    }

    fn build_key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.namespace, key)
        }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let value: Option<Vec<u8>> = self.redis.get(self.build_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        let _: () = self
            .redis
            .set(self.build_key(key), Bytes::from(value), None, None, false)
            .await?;
        Ok(())
    }
}

/// In-process store for tests and local development.
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
