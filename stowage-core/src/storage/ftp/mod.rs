//! FTP content backend
//!
//! Each operation opens its own control connection, logs in, switches to
//! binary mode and transfers over a passive data connection.

mod client;

pub use client::{FtpSession, Reply, parse_pasv_port};

use crate::error::{Result, StowageError};
use crate::storage::ContentStore;
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

const DEFAULT_PORT: u16 = 21;

#[derive(Debug, Clone, Default)]
pub struct FtpSettings {
    /// `ftp://host[:port][/base/dir]` or a bare host name.
    pub host: String,
    pub username: String,
    pub password: String,
}

pub struct FtpContentStore {
    host: String,
    port: u16,
    base_segments: Vec<String>,
    username: String,
    password: String,
}

impl std::fmt::Debug for FtpContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpContentStore")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_segments", &self.base_segments)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FtpContentStore {
    pub fn new(settings: FtpSettings) -> Result<Self> {
        let raw = settings.host.trim();
        if raw.is_empty() {
            return Err(StowageError::Config("ftp host is required".to_string()));
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("ftp://{}", raw)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| StowageError::Config(format!("invalid ftp host {}: {}", raw, e)))?;
        if url.scheme() != "ftp" {
            return Err(StowageError::Config(format!(
                "unsupported ftp scheme: {}",
                url.scheme()
            )));
        }

        let host = match url.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            Some(url::Host::Ipv4(ip)) => ip.to_string(),
            Some(url::Host::Ipv6(ip)) => ip.to_string(),
            None => {
                return Err(StowageError::Config(format!(
                    "ftp host has no host name: {}",
                    raw
                )));
            }
        };

        let base_segments = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            base_segments,
            username: settings.username,
            password: settings.password,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Remote path segments for `id`: base directory first, then each id
    /// segment percent-escaped.
    pub fn remote_segments(&self, id: &str) -> Result<Vec<String>> {
        let normalized = id.replace('\\', "/");
        let id_segments: Vec<String> = normalized
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(escape_segment)
            .collect();

        if id_segments.is_empty() {
            return Err(StowageError::PathSafety(format!(
                "id {:?} has no path segments",
                id
            )));
        }

        Ok(self
            .base_segments
            .iter()
            .cloned()
            .chain(id_segments)
            .collect())
    }

    pub fn remote_path(&self, id: &str) -> Result<String> {
        Ok(self.remote_segments(id)?.join("/"))
    }

    async fn open_session(&self) -> Result<FtpSession> {
        let mut session = FtpSession::connect(&self.host, self.port).await?;
        session.login(&self.username, &self.password).await?;
        session.binary_mode().await?;
        Ok(session)
    }
}

/// Percent-escape a path segment. Dot segments are escaped as well so they
/// can not walk out of the base directory.
fn escape_segment(segment: &str) -> String {
    match segment {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => urlencoding::encode(segment).into_owned(),
    }
}

#[async_trait]
impl ContentStore for FtpContentStore {
    fn name(&self) -> &'static str {
        "ftp"
    }

    async fn save(&self, id: &str, data: Bytes) -> Result<()> {
        let segments = self.remote_segments(id)?;
        let path = segments.join("/");

        let mut session = self.open_session().await?;
        let result = async {
            for depth in 1..segments.len() {
                session.make_dir(&segments[..depth].join("/")).await?;
            }
            session.store(&path, &data).await
        }
        .await;
        session.quit().await;

        result?;
        tracing::debug!("Uploaded {} bytes to ftp://{}/{}", data.len(), self.host, path);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Bytes> {
        let path = self.remote_path(id)?;

        let mut session = self.open_session().await?;
        let result = session.retrieve(&path).await;
        session.quit().await;

        match result? {
            Some(data) => Ok(Bytes::from(data)),
            None => Err(StowageError::NotFound(id.to_string())),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let path = self.remote_path(id)?;

        let mut session = self.open_session().await?;
        let result = session.size(&path).await;
        session.quit().await;

        Ok(result?.is_some())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.remote_path(id)?;

        let mut session = self.open_session().await?;
        let result = session.delete(&path).await;
        session.quit().await;

        if !result? {
            tracing::warn!("FTP delete of missing file {} treated as success", path);
        }
        Ok(())
    }
}
