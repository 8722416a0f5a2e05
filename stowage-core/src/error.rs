use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StowageError>;

#[derive(Error, Debug)]
pub enum StowageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("unsafe blob path: {0}")]
    PathSafety(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("remote protocol error: {0}")]
    RemoteProtocol(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StowageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StowageError::NotFound(_))
    }
}

impl From<reqwest::Error> for StowageError {
    fn from(error: reqwest::Error) -> Self {
        StowageError::Http(error.to_string())
    }
}
