use super::{
    ContentStore, DbContentStore, FsContentStore, FtpContentStore, S3ContentStore,
    ftp::FtpSettings, s3_store::S3Settings,
};
use crate::db::BlobDb;
use crate::error::{Result, StowageError};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_S3_ENDPOINT: &str = "s3.amazonaws.com";
pub const DEFAULT_S3_REGION: &str = "us-east-1";
pub const DEFAULT_S3_SCHEME: &str = "https";

/// Validates backend settings and constructs the selected [`ContentStore`].
#[derive(Debug, Clone, Default)]
pub struct ContentStoreBuilder {
    backend: Option<String>,
    filesystem_root: Option<PathBuf>,
    database: Option<BlobDb>,
    s3_bucket: Option<String>,
    s3_endpoint_host: Option<String>,
    s3_region: Option<String>,
    s3_access_key: Option<String>,
    s3_secret_key: Option<String>,
    s3_use_path_style: bool,
    s3_scheme: Option<String>,
    ftp_host: Option<String>,
    ftp_username: Option<String>,
    ftp_password: Option<String>,
    http_client: Option<reqwest::Client>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(value: &Option<String>, what: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| StowageError::Config(format!("{} is required", what)))
}

impl ContentStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn filesystem_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.filesystem_root = Some(root.into());
        self
    }

    pub fn database(mut self, db: BlobDb) -> Self {
        self.database = Some(db);
        self
    }

    pub fn s3_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.s3_bucket = Some(bucket.into());
        self
    }

    pub fn s3_endpoint_host(mut self, host: impl Into<String>) -> Self {
        self.s3_endpoint_host = Some(host.into());
        self
    }

    pub fn s3_region(mut self, region: impl Into<String>) -> Self {
        self.s3_region = Some(region.into());
        self
    }

    pub fn s3_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.s3_access_key = Some(access_key.into());
        self.s3_secret_key = Some(secret_key.into());
        self
    }

    pub fn s3_use_path_style(mut self, use_path_style: bool) -> Self {
        self.s3_use_path_style = use_path_style;
        self
    }

    pub fn s3_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.s3_scheme = Some(scheme.into());
        self
    }

    pub fn ftp_host(mut self, host: impl Into<String>) -> Self {
        self.ftp_host = Some(host.into());
        self
    }

    pub fn ftp_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.ftp_username = Some(username.into());
        self.ftp_password = Some(password.into());
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(StowageError::Config(
                "storage backend cannot be empty".to_string(),
            ));
        }

        Ok(backend)
    }

    fn s3_settings(&self) -> Result<S3Settings> {
        let scheme = non_empty(&self.s3_scheme)
            .unwrap_or_else(|| DEFAULT_S3_SCHEME.to_string())
            .to_ascii_lowercase();
        if scheme != "https" && scheme != "http" {
            return Err(StowageError::Config(format!(
                "unsupported s3 scheme: {}",
                scheme
            )));
        }

        Ok(S3Settings {
            bucket: required(&self.s3_bucket, "s3 bucket")?,
            endpoint_host: non_empty(&self.s3_endpoint_host)
                .unwrap_or_else(|| DEFAULT_S3_ENDPOINT.to_string()),
            region: non_empty(&self.s3_region).unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            access_key: required(&self.s3_access_key, "s3 access key")?,
            secret_key: required(&self.s3_secret_key, "s3 secret key")?,
            use_path_style: self.s3_use_path_style,
            scheme,
        })
    }

    fn ftp_settings(&self) -> Result<FtpSettings> {
        Ok(FtpSettings {
            host: required(&self.ftp_host, "ftp host")?,
            username: required(&self.ftp_username, "ftp username")?,
            // Passwords are taken verbatim; only emptiness is rejected.
            password: self
                .ftp_password
                .clone()
                .filter(|password| !password.is_empty())
                .ok_or_else(|| StowageError::Config("ftp password is required".to_string()))?,
        })
    }

    pub fn build(&self) -> Result<Arc<dyn ContentStore>> {
        let backend = self.resolve_backend()?;

        let store: Arc<dyn ContentStore> = match backend.as_str() {
            "filesystem" => {
                let root = self.filesystem_root.clone().ok_or_else(|| {
                    StowageError::Config(
                        "filesystem root is required for filesystem backend".to_string(),
                    )
                })?;
                if root.as_os_str().is_empty() {
                    return Err(StowageError::Config(
                        "filesystem root cannot be empty".to_string(),
                    ));
                }
                Arc::new(FsContentStore::new(root)?)
            }
            "database" => {
                let db = self.database.clone().ok_or_else(|| {
                    StowageError::Config(
                        "database handle is required for database backend".to_string(),
                    )
                })?;
                Arc::new(DbContentStore::new(db))
            }
            "s3" => {
                let settings = self.s3_settings()?;
                let client = self.http_client.clone().unwrap_or_default();
                Arc::new(S3ContentStore::new(client, settings))
            }
            "ftp" => Arc::new(FtpContentStore::new(self.ftp_settings()?)?),
            other => {
                return Err(StowageError::Config(format!(
                    "unsupported storage backend: {}",
                    other
                )));
            }
        };

        tracing::info!("Content store ready: backend={}", store.name());
        Ok(store)
    }
}
