use crate::error::{Result, StowageError};
use crate::metadata::MetadataStore;
use crate::operations::with_deadline;
use crate::storage::ContentStore;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RetrieveBlobOperation {
    content: Arc<dyn ContentStore>,
    metadata: Arc<dyn MetadataStore>,
    timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RetrieveBlobOperationRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct RetrieveBlobOperationResult {
    pub id: String,
    /// Base64 of the stored bytes
    pub data: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl RetrieveBlobOperation {
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

    pub async fn run(
        &self,
        request: RetrieveBlobOperationRequest,
    ) -> Result<RetrieveBlobOperationResult> {
        let RetrieveBlobOperationRequest { id } = request;

        let (meta, body) = with_deadline(self.timeout, async {
            let meta = self
                .metadata
                .get(&id)
                .await?
                .ok_or_else(|| StowageError::NotFound(id.clone()))?;

            let body = match self.content.get(&id).await {
                Ok(body) => body,
                Err(error) if error.is_not_found() => {
                    tracing::warn!(
                        "Blob metadata present but content missing. id={} backend={}",
                        id,
                        self.content.name()
                    );
                    return Err(StowageError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("content missing for blob {}", id),
                    )));
                }
                Err(error) => return Err(error),
            };

            Ok((meta, body))
        })
        .await?;

        tracing::info!("Retrieved blob. id={} size={}", id, meta.size);

        Ok(RetrieveBlobOperationResult {
            data: STANDARD.encode(&body),
            id,
            size: meta.size,
            created_at: meta.created_at,
        })
    }
}
