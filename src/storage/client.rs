//! Storage client: listing, keyed uploads with percentage progress, and
//! presigned preview URLs on top of an [`ObjectStore`].

use bytes::Bytes;
use metrics::counter;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{ObjectStore, ObjectSummary, TransferProgress};
use crate::errors::{ClientError, ClientResult};
use crate::metrics::{outcome, UPLOADS_TOTAL, UPLOAD_BYTES_TOTAL};

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Base name; becomes the last key segment.
    pub name: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read `path` from disk, keeping only its file name.
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidArgument {
                message: format!("not a file path: {}", path.display()),
            })?
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::InvalidArgument {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        Ok(Self::new(name, data))
    }
}

/// Turns byte counts into rounded percentages, emitting each value once
/// and never going backwards.  Byte counts top out at 99; only
/// [`finish`](Self::finish) reports 100.
pub struct ProgressTracker<F> {
    last: Mutex<Option<u8>>,
    on_progress: F,
}

impl<F: Fn(u8)> ProgressTracker<F> {
    pub fn new(on_progress: F) -> Self {
        Self {
            last: Mutex::new(None),
            on_progress,
        }
    }

    /// Record that `sent` of `total` bytes are out.
    ///
    /// Bytes handed to the transport are not yet stored, so this never
    /// reports completion.
    pub fn update(&self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = ((sent.min(total) as f64 / total as f64) * 100.0).round() as u8;
        self.emit(percent.min(99));
    }

    /// Report completion.
    pub fn finish(&self) {
        self.emit(100);
    }

    fn emit(&self, percent: u8) {
        let mut last = self.last.lock().expect("progress poisoned");
        if last.map_or(true, |prev| percent > prev) {
            *last = Some(percent);
            (self.on_progress)(percent);
        }
    }
}

/// Bucket-scoped storage operations.
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key_prefix: String,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, key_prefix: String) -> Self {
        Self {
            store,
            bucket,
            key_prefix: key_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Up to `max_keys` objects of the bucket.
    pub async fn list(&self, max_keys: i32) -> ClientResult<Vec<ObjectSummary>> {
        debug!("Listing {} (max_keys={})", self.bucket, max_keys);
        self.store.list(&self.bucket, max_keys).await
    }

    /// Object key for a new upload of `file_name` by `user_id`.
    pub fn object_key(&self, user_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/images/{}/{}",
            self.key_prefix,
            user_id,
            Uuid::new_v4(),
            file_name
        )
    }

    /// Upload `file` under a fresh key and return the key.
    ///
    /// `on_progress` receives whole percentages, non-decreasing, ending at
    /// 100 when the upload succeeds.  A failed upload is not cleaned up.
    pub async fn upload<F>(
        &self,
        user_id: &str,
        file: UploadFile,
        on_progress: F,
    ) -> ClientResult<String>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let key = self.object_key(user_id, &file.name);
        let size = file.data.len() as u64;
        let tracker = Arc::new(ProgressTracker::new(on_progress));
        let progress: TransferProgress = {
            let tracker = tracker.clone();
            Arc::new(move |sent, total| tracker.update(sent, total))
        };

        let result = self.store.put(&self.bucket, &key, file.data, progress).await;
        counter!(UPLOADS_TOTAL, "outcome" => outcome(&result)).increment(1);
        result?;

        tracker.finish();
        counter!(UPLOAD_BYTES_TOTAL).increment(size);
        info!("Uploaded {} ({} bytes)", key, size);
        Ok(key)
    }

    /// Presigned GET URL for `key`; no network round trip.
    pub fn get_presigned_url(&self, key: &str, ttl_seconds: u64) -> ClientResult<String> {
        self.store.presign_get(&self.bucket, key, ttl_seconds)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryObjectStore;
    use std::io::Write;

    fn client(store: Arc<MemoryObjectStore>) -> StorageClient {
        StorageClient::new(store, "photos".to_string(), "uploads/".to_string())
    }

    fn recorder() -> (impl Fn(u8) + Send + Sync + 'static, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (move |p| sink.lock().unwrap().push(p), seen)
    }

    #[test]
    fn test_key_format() {
        let client = client(Arc::new(MemoryObjectStore::new()));
        let key = client.object_key("u1", "a.png");
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "uploads");
        assert_eq!(parts[1], "u1");
        assert_eq!(parts[2], "images");
        assert!(Uuid::parse_str(parts[3]).is_ok());
        assert_eq!(parts[4], "a.png");
        assert_ne!(key, client.object_key("u1", "a.png"));
    }

    #[tokio::test]
    async fn test_upload_progress_ends_at_100() {
        let store = Arc::new(MemoryObjectStore::new().with_chunk_size(3));
        let client = client(store.clone());
        let (on_progress, seen) = recorder();

        let key = client
            .upload("u1", UploadFile::new("a.png", vec![7u8; 10]), on_progress)
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![30, 60, 90, 100]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(store.get("photos", &key).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_empty_file_reports_100_once() {
        let client = client(Arc::new(MemoryObjectStore::new()));
        let (on_progress, seen) = recorder();
        client
            .upload("u1", UploadFile::new("empty.png", Vec::new()), on_progress)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_failed_upload_never_reaches_100() {
        let store = Arc::new(MemoryObjectStore::new().with_chunk_size(1));
        store.fail_uploads_of("bad.png");
        let client = client(store);
        let (on_progress, seen) = recorder();

        let err = client
            .upload("u1", UploadFile::new("bad.png", vec![0u8; 4]), on_progress)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "StorageError");
        assert!(!seen.lock().unwrap().contains(&100));
    }

    #[test]
    fn test_tracker_rounds_and_skips_repeats() {
        let (on_progress, seen) = recorder();
        let tracker = ProgressTracker::new(on_progress);
        tracker.update(1, 3);
        tracker.update(1, 3);
        tracker.update(2, 3);
        tracker.update(1, 3);
        tracker.update(3, 3);
        tracker.finish();
        assert_eq!(*seen.lock().unwrap(), vec![33, 67, 99, 100]);
    }

    #[test]
    fn test_tracker_holds_99_until_finish() {
        let (on_progress, seen) = recorder();
        let tracker = ProgressTracker::new(on_progress);
        tracker.update(199, 200);
        tracker.update(200, 200);
        tracker.update(0, 0);
        assert_eq!(*seen.lock().unwrap(), vec![99]);
        tracker.finish();
        assert_eq!(*seen.lock().unwrap(), vec![99, 100]);
    }

    #[tokio::test]
    async fn test_list_and_presign() {
        let store = Arc::new(MemoryObjectStore::new());
        let client = client(store);
        let (on_progress, _) = recorder();
        let key = client
            .upload("u1", UploadFile::new("a.png", b"abc".to_vec()), on_progress)
            .await
            .unwrap();

        let listed = client.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, key);
        assert_eq!(
            client.get_presigned_url(&key, 900).unwrap(),
            format!("memory://photos/{key}?expires=900")
        );
    }

    #[tokio::test]
    async fn test_upload_file_from_path_keeps_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.jpg");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"jpeg")
            .unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "holiday.jpg");
        assert_eq!(file.data.as_ref(), b"jpeg");

        let err = UploadFile::from_path(dir.path().join("missing.jpg"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
    }
}
