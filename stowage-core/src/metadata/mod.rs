//! Blob metadata: size and creation time per id

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub id: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record, or update only the size of an existing one.
    /// `created_at` is ignored when the record already exists.
    async fn upsert(&self, id: &str, size: u64, created_at: DateTime<Utc>) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<BlobMetadata>>;
}
