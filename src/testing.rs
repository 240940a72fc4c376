//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, AppResult};
use crate::models::{ObjectMetadata, PendingUpload, TransferProgress};
use crate::storage::{LocalStorage, ObjectStorage};

pub const TEST_BASE_URL: &str = "http://localhost:3210";

pub fn pending(name: &str, data: &[u8]) -> PendingUpload {
    PendingUpload {
        name: name.to_string(),
        data: Bytes::copy_from_slice(data),
        content_type: None,
    }
}

/// A local bucket that counts calls and fails on request for chosen keys
pub struct ScriptedStorage {
    root: PathBuf,
    inner: LocalStorage,
    calls: AtomicUsize,
    failing_list: AtomicBool,
    uploads: Mutex<Vec<String>>,
    failing_uploads: Mutex<HashSet<String>>,
    failing_downloads: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl ScriptedStorage {
    pub async fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            inner: LocalStorage::new(root, TEST_BASE_URL).await.unwrap(),
            calls: AtomicUsize::new(0),
            failing_list: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
            failing_uploads: Mutex::new(HashSet::new()),
            failing_downloads: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
        }
    }

    /// Drop a file into the bucket without any metadata sidecar
    pub async fn put_raw(&self, key: &str, data: &[u8]) {
        tokio::fs::write(self.root.join("objects").join(key), data)
            .await
            .unwrap();
    }

    pub fn fail_listing(&self) {
        self.failing_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_upload_of(&self, key: &str) {
        self.failing_uploads.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_download_of(&self, key: &str) {
        self.failing_downloads.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn upload_attempts(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for ScriptedStorage {
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        self.record();
        if self.failing_list.load(Ordering::SeqCst) {
            return Err(AppError::StorageError("bucket listing unavailable".to_string()));
        }
        self.inner.list(prefix).await
    }

    async fn metadata(&self, key: &str) -> AppResult<ObjectMetadata> {
        self.record();
        self.inner.metadata(key).await
    }

    async fn download_url(&self, key: &str) -> AppResult<String> {
        self.record();
        self.inner.download_url(key).await
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        custom_metadata: HashMap<String, String>,
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> AppResult<ObjectMetadata> {
        self.record();
        self.uploads.lock().unwrap().push(key.to_string());
        if self.failing_uploads.lock().unwrap().contains(key) {
            return Err(AppError::UploadFailed {
                name: key.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.inner
            .upload(key, data, content_type, custom_metadata, progress)
            .await
    }

    async fn download(&self, key: &str) -> AppResult<Bytes> {
        self.record();
        if self.failing_downloads.lock().unwrap().contains(key) {
            return Err(AppError::StorageError(format!("fetch of '{}' timed out", key)));
        }
        self.inner.download(key).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.record();
        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(AppError::StorageError(format!("permission denied for '{}'", key)));
        }
        self.inner.delete(key).await
    }
}
