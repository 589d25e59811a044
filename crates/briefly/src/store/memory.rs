//! In-memory [`ObjectStore`] for tests and throwaway deployments.
//!
//! Objects live in a `HashMap` behind `std::sync::RwLock`. Every successful
//! `put` is counted so callers can assert how much was actually uploaded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::StoreError;

use super::ObjectStore;

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

type ObjectMap = HashMap<(String, String), StoredObject>;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<ObjectMap>,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded for an object.
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// Drops an object, as an external cleanup would.
    pub fn remove(&self, bucket: &str, key: &str) -> bool {
        self.write()
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectMap> {
        self.objects.read().unwrap_or_else(|poisoned| {
            log::warn!("Object store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObjectMap> {
        self.objects.write().unwrap_or_else(|poisoned| {
            log::warn!("Object store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .read()
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        if key.is_empty() || bucket.is_empty() {
            return Err(StoreError::InvalidKey(format!("{}/{}", bucket, key)));
        }
        self.write().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(key.to_string())
    }
}
