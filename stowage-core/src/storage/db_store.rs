use crate::db::BlobDb;
use crate::error::{Result, StowageError};
use crate::storage::ContentStore;
use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{OptionalExtension, params};

/// Stores blob bytes as rows of the `blob_content` table.
pub struct DbContentStore {
    db: BlobDb,
}

impl DbContentStore {
    pub fn new(db: BlobDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentStore for DbContentStore {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn save(&self, id: &str, data: Bytes) -> Result<()> {
        let key = id.to_string();
        let size = data.len();

        self.db
            .call(move |conn| {
                let existing: Option<String> = conn
                    .query_row(
                        "SELECT id FROM blob_content WHERE id = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;

                match existing {
                    None => {
                        conn.execute(
                            "INSERT INTO blob_content (id, data) VALUES (?1, ?2)",
                            params![key, data.as_ref()],
                        )?;
                    }
                    Some(_) => {
                        conn.execute(
                            "UPDATE blob_content SET data = ?2 WHERE id = ?1",
                            params![key, data.as_ref()],
                        )?;
                    }
                }
                Ok(())
            })
            .await?;

        tracing::debug!("Stored {} bytes for blob {} in database", size, id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Bytes> {
        let key = id.to_string();

        let row: Option<Option<Vec<u8>>> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT data FROM blob_content WHERE id = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        match row {
            Some(data) => Ok(Bytes::from(data.unwrap_or_default())),
            None => Err(StowageError::NotFound(id.to_string())),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let key = id.to_string();
        self.db
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM blob_content WHERE id = ?1)",
                    [&key],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let key = id.to_string();
        let affected = self
            .db
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM blob_content WHERE id = ?1", [&key])?)
            })
            .await?;

        if affected == 0 {
            tracing::debug!("Delete of missing blob {} ignored", id);
        }
        Ok(())
    }
}
