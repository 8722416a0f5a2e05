//! In-memory content backend (for testing)

use crate::error::{Result, StowageError};
use crate::storage::ContentStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

/// Content store held in process memory. Not persistent.
#[derive(Default)]
pub struct InMemoryContentStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.blobs.read().map_err(|_| Self::poisoned())?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn poisoned() -> StowageError {
        StowageError::Internal("in-memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, id: &str, data: Bytes) -> Result<()> {
        self.blobs
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Bytes> {
        self.blobs
            .read()
            .map_err(|_| Self::poisoned())?
            .get(id)
            .cloned()
            .ok_or_else(|| StowageError::NotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| Self::poisoned())?
            .contains_key(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.blobs
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(id);
        Ok(())
    }
}
