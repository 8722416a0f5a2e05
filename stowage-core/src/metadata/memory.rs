use super::{BlobMetadata, MetadataStore};
use crate::error::{Result, StowageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<String, BlobMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn upsert(&self, id: &str, size: u64, created_at: DateTime<Utc>) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StowageError::Internal("metadata lock poisoned".to_string()))?;

        records
            .entry(id.to_string())
            .and_modify(|meta| meta.size = size)
            .or_insert_with(|| BlobMetadata {
                id: id.to_string(),
                size,
                created_at,
            });
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<BlobMetadata>> {
        let records = self
            .records
            .read()
            .map_err(|_| StowageError::Internal("metadata lock poisoned".to_string()))?;
        Ok(records.get(id).cloned())
    }
}
