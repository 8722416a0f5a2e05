//! Stowage Core - base64 blob storage over pluggable content backends
//!
//! - Content goes to one backend chosen at startup: local filesystem, SQLite,
//!   S3-compatible object storage (SigV4) or FTP
//! - Metadata (size, creation time) lives in SQLite
//! - Store writes content before metadata; retrieve reads metadata first

pub mod db;
pub mod error;
pub mod metadata;
pub mod operations;
pub mod storage;

pub use db::BlobDb;
pub use error::{Result, StowageError};
pub use metadata::{BlobMetadata, InMemoryMetadataStore, MetadataStore, SqliteMetadataStore};
pub use operations::{
    RetrieveBlobOperation, RetrieveBlobOperationRequest, RetrieveBlobOperationResult,
    StoreBlobOperation, StoreBlobOperationRequest, StoreBlobOperationResult,
};
pub use storage::{
    ContentStore, ContentStoreBuilder, DbContentStore, FsContentStore, FtpContentStore,
    InMemoryContentStore, S3ContentStore,
};
