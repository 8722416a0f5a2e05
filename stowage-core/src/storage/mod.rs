//! Content storage backends for Stowage
//!
//! Every backend implements [`ContentStore`], keyed by an opaque blob id.
//! The active backend is chosen once at startup through [`ContentStoreBuilder`].
//!
//! | Backend               | Selector     | Persistence                     |
//! |-----------------------|--------------|---------------------------------|
//! | `FsContentStore`      | `filesystem` | files under a sandboxed root    |
//! | `DbContentStore`      | `database`   | `blob_content` table in SQLite  |
//! | `S3ContentStore`      | `s3`         | signed HTTP against S3 / MinIO  |
//! | `FtpContentStore`     | `ftp`        | remote FTP server               |
//! | `InMemoryContentStore`| (tests)      | process memory                  |

pub mod db_store;
pub mod factory;
pub mod fs_store;
pub mod ftp;
pub mod memory_store;
pub mod s3_store;
pub mod sigv4;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub use db_store::DbContentStore;
pub use factory::ContentStoreBuilder;
pub use fs_store::FsContentStore;
pub use ftp::FtpContentStore;
pub use memory_store::InMemoryContentStore;
pub use s3_store::S3ContentStore;

/// Blob content storage keyed by id.
///
/// Ids are untrusted input. Backends that map them onto paths or URLs must
/// sanitize them before touching the underlying store.
///
/// Dropping a returned future aborts the I/O it owns, which is how callers
/// cancel or time out an operation.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short backend name used in logs and health output
    fn name(&self) -> &'static str;

    /// Store content under `id`, replacing any previous content.
    async fn save(&self, id: &str, data: Bytes) -> Result<()>;

    /// Fetch content for `id`.
    ///
    /// Returns `StowageError::NotFound` if nothing is stored under `id`.
    async fn get(&self, id: &str) -> Result<Bytes>;

    /// Check whether content exists. A missing id is `Ok(false)`, never an error.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Remove content for `id`. Deleting a missing id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}
