use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use stowage_core::{BlobDb, ContentStoreBuilder, Result, StowageError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// SQLite file holding blob metadata (and content for the `database` backend)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/blobs.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Per-request deadline for store/retrieve; unset means no deadline
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    pub s3: Option<S3Config>,
    pub ftp: Option<FtpConfig>,
}

impl StorageConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    Database,
    S3,
    Ftp,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Filesystem => "filesystem",
            StorageBackend::Database => "database",
            StorageBackend::S3 => "s3",
            StorageBackend::Ftp => "ftp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_filesystem_root")]
    pub root: PathBuf,
}

fn default_filesystem_root() -> PathBuf {
    PathBuf::from("data/blobs")
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: default_filesystem_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_s3_endpoint_host")]
    pub endpoint_host: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub use_path_style: bool,
    #[serde(default = "default_s3_scheme")]
    pub scheme: String,
}

fn default_s3_endpoint_host() -> String {
    stowage_core::storage::factory::DEFAULT_S3_ENDPOINT.to_string()
}

fn default_s3_region() -> String {
    stowage_core::storage::factory::DEFAULT_S3_REGION.to_string()
}

fn default_s3_scheme() -> String {
    stowage_core::storage::factory::DEFAULT_S3_SCHEME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(
                ::config::Environment::with_prefix("STOWAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| StowageError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| StowageError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Backend builder for the configured storage section. Missing sections
    /// are left unset so the builder reports them.
    pub fn content_store_builder(&self, db: BlobDb) -> ContentStoreBuilder {
        let storage = &self.storage;
        let mut builder = ContentStoreBuilder::new()
            .backend(storage.backend.as_str())
            .filesystem_root(storage.filesystem.root.clone())
            .database(db);

        if let Some(s3) = &storage.s3 {
            builder = builder
                .s3_bucket(s3.bucket.clone())
                .s3_endpoint_host(s3.endpoint_host.clone())
                .s3_region(s3.region.clone())
                .s3_credentials(s3.access_key.clone(), s3.secret_key.clone())
                .s3_use_path_style(s3.use_path_style)
                .s3_scheme(s3.scheme.clone());
        }

        if let Some(ftp) = &storage.ftp {
            builder = builder
                .ftp_host(ftp.host.clone())
                .ftp_credentials(ftp.username.clone(), ftp.password.clone());
        }

        builder
    }
}
