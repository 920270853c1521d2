//! Abstract object store trait.
//!
//! The storage client works against [`ObjectStore`] so it does not care
//! whether objects go to S3 or stay in memory.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::ClientResult;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Byte-level transfer callback: `(sent, total)`.
pub type TransferProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Async object storage contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// List up to `max_keys` objects in `bucket`.
    fn list(
        &self,
        bucket: &str,
        max_keys: i32,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<ObjectSummary>>> + Send + '_>>;

    /// Write `data` to `key`, reporting bytes sent through `progress`.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: TransferProgress,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>>;

    /// A GET URL for `key` valid for `ttl_seconds`, computed locally.
    fn presign_get(&self, bucket: &str, key: &str, ttl_seconds: u64) -> ClientResult<String>;
}
