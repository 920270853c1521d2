//! In-memory object store.
//!
//! Objects live in a `tokio::sync::RwLock<BTreeMap<...>>` keyed by
//! `bucket/key`.  Per-file-name delays and failures can be injected so
//! concurrent upload ordering and partial failure are reproducible.
//!
//! When built [`with_credentials`](MemoryObjectStore::with_credentials),
//! every call needs a storage credential exactly like the S3 store does.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::store::{ObjectStore, ObjectSummary, TransferProgress};
use crate::credentials::CredentialProvider;
use crate::errors::{ClientError, ClientResult};
use crate::sigv4::MAX_PRESIGNED_EXPIRES;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// In-process object store.
pub struct MemoryObjectStore {
    /// `bucket/key` -> object bytes.
    objects: tokio::sync::RwLock<BTreeMap<String, Bytes>>,
    credentials: Option<CredentialProvider>,
    /// File name -> delay before the upload completes.
    delays: Mutex<HashMap<String, Duration>>,
    /// File names whose uploads fail halfway.
    failures: Mutex<HashSet<String>>,
    chunk_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: tokio::sync::RwLock::new(BTreeMap::new()),
            credentials: None,
            delays: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashSet::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Require a credential from `credentials` for every call.
    pub fn with_credentials(mut self, credentials: CredentialProvider) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Delay uploads of objects whose key ends in `file_name`.
    pub fn set_delay(&self, file_name: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("delays poisoned")
            .insert(file_name.to_string(), delay);
    }

    /// Fail uploads of objects whose key ends in `file_name`.
    pub fn fail_uploads_of(&self, file_name: &str) {
        self.failures
            .lock()
            .expect("failures poisoned")
            .insert(file_name.to_string());
    }

    /// Stored bytes of `key`, if any.
    pub async fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .await
            .get(&format!("{bucket}/{key}"))
            .cloned()
    }

    async fn require_credential(&self) -> ClientResult<()> {
        if let Some(credentials) = &self.credentials {
            credentials.credential().await?;
        }
        Ok(())
    }
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

impl ObjectStore for MemoryObjectStore {
    fn list(
        &self,
        bucket: &str,
        max_keys: i32,
    ) -> Pin<Box<dyn Future<Output = ClientResult<Vec<ObjectSummary>>> + Send + '_>> {
        let prefix = format!("{bucket}/");
        Box::pin(async move {
            self.require_credential().await?;
            let objects = self.objects.read().await;
            Ok(objects
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .take(max_keys.max(0) as usize)
                .map(|(k, data)| ObjectSummary {
                    name: k[prefix.len()..].to_string(),
                    size: data.len() as u64,
                })
                .collect())
        })
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: TransferProgress,
    ) -> Pin<Box<dyn Future<Output = ClientResult<()>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.require_credential().await?;
            let name = file_name(&key).to_string();
            let delay = self
                .delays
                .lock()
                .expect("delays poisoned")
                .get(&name)
                .copied();
            let fail = self
                .failures
                .lock()
                .expect("failures poisoned")
                .contains(&name);

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let total = data.len() as u64;
            let mut sent = 0u64;
            for start in (0..data.len()).step_by(self.chunk_size) {
                if fail && sent * 2 >= total {
                    return Err(ClientError::storage(format!(
                        "connection reset while uploading {key}"
                    )));
                }
                let end = (start + self.chunk_size).min(data.len());
                sent += (end - start) as u64;
                progress(sent, total);
            }
            if fail {
                return Err(ClientError::storage(format!(
                    "connection reset while uploading {key}"
                )));
            }

            debug!("Memory PUT: {}/{} ({} bytes)", bucket, key, total);
            self.objects
                .write()
                .await
                .insert(format!("{bucket}/{key}"), data);
            Ok(())
        })
    }

    fn presign_get(&self, bucket: &str, key: &str, ttl_seconds: u64) -> ClientResult<String> {
        if let Some(credentials) = &self.credentials {
            credentials.cached().ok_or(ClientError::NoCredential)?;
        }
        if ttl_seconds == 0 || ttl_seconds > MAX_PRESIGNED_EXPIRES {
            return Err(ClientError::InvalidArgument {
                message: format!("X-Amz-Expires must be between 1 and {MAX_PRESIGNED_EXPIRES}"),
            });
        }
        Ok(format!("memory://{bucket}/{key}?expires={ttl_seconds}"))
    }
}

// -- Tests -------------------------------------------------------------------
