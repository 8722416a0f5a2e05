use super::{BlobMetadata, MetadataStore};
use crate::db::BlobDb;
use crate::error::{Result, StowageError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};

/// Metadata kept in the `blob_metadata` table. Timestamps are RFC 3339 text.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    db: BlobDb,
}

impl SqliteMetadataStore {
    pub fn new(db: BlobDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn upsert(&self, id: &str, size: u64, created_at: DateTime<Utc>) -> Result<()> {
        let key = id.to_string();
        let created_at = created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO blob_metadata (id, size, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET size = excluded.size",
                    params![key, size as i64, created_at],
                )?;
                Ok(())
            })
            .await
    }

    async fn get(&self, id: &str) -> Result<Option<BlobMetadata>> {
        let key = id.to_string();

        let row: Option<(i64, String)> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT size, created_at FROM blob_metadata WHERE id = ?1",
                        [&key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?)
            })
            .await?;

        let Some((size, created_at)) = row else {
            return Ok(None);
        };

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| {
                StowageError::Internal(format!(
                    "invalid created_at {:?} for blob {}: {}",
                    created_at, id, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Some(BlobMetadata {
            id: id.to_string(),
            size: size as u64,
            created_at,
        }))
    }
}
