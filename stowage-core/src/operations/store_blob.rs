use crate::error::{Result, StowageError};
use crate::metadata::MetadataStore;
use crate::operations::with_deadline;
use crate::storage::ContentStore;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

#[derive(Clone)]
pub struct StoreBlobOperation {
    content: Arc<dyn ContentStore>,
    metadata: Arc<dyn MetadataStore>,
    timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StoreBlobOperationRequest {
    /// Base64 (standard alphabet, padded) payload
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct StoreBlobOperationResult {
    pub id: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl StoreBlobOperation {
    pub fn new(content: Arc<dyn ContentStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            content,
            metadata,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self, request: StoreBlobOperationRequest) -> Result<StoreBlobOperationResult> {
        let body = STANDARD
            .decode(request.data.trim())
            .map_err(|error| StowageError::InvalidEncoding(error.to_string()))?;

        let id = Ulid::new().to_string();
        let size = body.len() as u64;
        let created_at = Utc::now();

        with_deadline(self.timeout, async {
            // Content first: a failure between the two writes leaves orphaned
            // content, never metadata without content.
            self.content.save(&id, Bytes::from(body)).await?;
            self.metadata.upsert(&id, size, created_at).await
        })
        .await?;

        tracing::info!(
            "Stored blob. id={} size={} backend={}",
            id,
            size,
            self.content.name()
        );

        Ok(StoreBlobOperationResult {
            id,
            size,
            created_at,
        })
    }
}
