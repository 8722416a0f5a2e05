pub mod retrieve_blob;
pub mod store_blob;

pub use retrieve_blob::{
    RetrieveBlobOperation, RetrieveBlobOperationRequest, RetrieveBlobOperationResult,
};
pub use store_blob::{StoreBlobOperation, StoreBlobOperationRequest, StoreBlobOperationResult};

use crate::error::{Result, StowageError};
use std::future::Future;
use std::time::Duration;

/// Run `future` under an optional deadline. On expiry the future is dropped,
/// which aborts whatever backend I/O it owns.
pub(crate) async fn with_deadline<T>(
    timeout: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| StowageError::Timeout(limit))?,
        None => future.await,
    }
}
