//! The current order: object keys of successfully uploaded photos.

use tokio::sync::RwLock;

/// Ordered list of uploaded object keys, shared by every upload task.
///
/// Keys are appended as uploads complete, so concurrent uploads land in
/// completion order.  The list lives only as long as the process.
#[derive(Debug, Default)]
pub struct OrderTracker {
    photos: RwLock<Vec<String>>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` and hand it back.
    pub async fn add(&self, key: String) -> String {
        self.photos.write().await.push(key.clone());
        key
    }

    /// Empty the order.
    pub async fn cancel(&self) {
        self.photos.write().await.clear();
    }

    /// Current keys, oldest first.
    pub async fn snapshot(&self) -> Vec<String> {
        self.photos.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.photos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.photos.read().await.is_empty()
    }
}
