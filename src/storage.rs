use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::models::{ObjectMetadata, TransferProgress};

/// Bytes written between two progress ticks
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Client for the bucket that holds the managed files.
///
/// The bucket is a flat namespace: keys never contain `/`, and `list`
/// only returns objects sitting directly at the root.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Keys of every object whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>>;

    async fn metadata(&self, key: &str) -> AppResult<ObjectMetadata>;

    /// URL a browser can fetch the object from
    async fn download_url(&self, key: &str) -> AppResult<String>;

    /// Store `data` under `key`, replacing any existing object
    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        custom_metadata: HashMap<String, String>,
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> AppResult<ObjectMetadata>;

    async fn download(&self, key: &str) -> AppResult<Bytes>;

    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Reject keys that would escape the flat bucket root
pub fn validate_object_key(key: &str) -> AppResult<()> {
    if key.is_empty() || key.len() > 1024 {
        return Err(AppError::InvalidObjectKey(
            "Key must be between 1 and 1024 characters".to_string(),
        ));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(AppError::InvalidObjectKey(
            "Keys live at the bucket root and cannot contain path separators".to_string(),
        ));
    }
    if key == "." || key == ".." {
        return Err(AppError::InvalidObjectKey(
            "Key cannot be '.' or '..'".to_string(),
        ));
    }
    Ok(())
}

/// File-system backed bucket
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Open the bucket at `root`, creating its directories if needed
    pub async fn new(root: impl Into<PathBuf>, base_url: &str) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))
            .await
            .map_err(|e| AppError::StorageError(format!("Cannot create data dir: {}", e)))?;
        fs::create_dir_all(root.join(".meta"))
            .await
            .map_err(|e| AppError::StorageError(format!("Cannot create metadata dir: {}", e)))?;

        Ok(Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn object_meta_path(&self, key: &str) -> PathBuf {
        self.root.join(".meta").join(format!("{}.json", key))
    }

    async fn ensure_exists(&self, key: &str) -> AppResult<PathBuf> {
        validate_object_key(key)?;
        let path = self.object_path(key);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::ObjectNotFound(key.to_string()));
        }
        Ok(path)
    }

    /// Rebuild metadata for an object whose sidecar is missing
    async fn reconstruct_metadata(&self, key: &str, path: &Path) -> AppResult<ObjectMetadata> {
        let data = fs::read(path).await?;
        let updated = fs::metadata(path)
            .await?
            .modified()
            .map(chrono::DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(ObjectMetadata {
            full_path: key.to_string(),
            name: key.to_string(),
            size: data.len() as u64,
            content_type: mime_guess::from_path(key).first_or_octet_stream().to_string(),
            etag: etag_of(&data),
            updated,
            custom_metadata: HashMap::new(),
        })
    }
}

fn etag_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(self.root.join("objects")).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let key = match entry.file_name().into_string() {
                Ok(key) => key,
                Err(name) => {
                    tracing::warn!(name = ?name, "Skipping object with a non UTF-8 name");
                    continue;
                }
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn metadata(&self, key: &str) -> AppResult<ObjectMetadata> {
        let path = self.ensure_exists(key).await?;
        let meta_path = self.object_meta_path(key);
        if !fs::try_exists(&meta_path).await.unwrap_or(false) {
            return self.reconstruct_metadata(key, &path).await;
        }

        let json = fs::read_to_string(&meta_path).await?;
        serde_json::from_str(&json)
            .map_err(|e| AppError::StorageError(format!("Corrupt metadata for '{}': {}", key, e)))
    }

    async fn download_url(&self, key: &str) -> AppResult<String> {
        self.ensure_exists(key).await?;
        Ok(format!("{}/objects/{}", self.base_url, urlencoding::encode(key)))
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        custom_metadata: HashMap<String, String>,
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> AppResult<ObjectMetadata> {
        validate_object_key(key)?;

        let total_bytes = data.len() as u64;
        let start = std::time::Instant::now();
        let content_type = content_type
            .map(|s| s.to_string())
            .unwrap_or_else(|| mime_guess::from_path(key).first_or_octet_stream().to_string());

        progress(TransferProgress { bytes_transferred: 0, total_bytes });

        let path = self.object_path(key);
        let mut file = fs::File::create(&path).await.map_err(|e| AppError::UploadFailed {
            name: key.to_string(),
            reason: format!("cannot create {}: {}", path.display(), e),
        })?;

        let mut written = 0u64;
        for chunk in data.chunks(UPLOAD_CHUNK_SIZE) {
            file.write_all(chunk).await.map_err(|e| AppError::UploadFailed {
                name: key.to_string(),
                reason: e.to_string(),
            })?;
            written += chunk.len() as u64;
            progress(TransferProgress { bytes_transferred: written, total_bytes });
        }
        file.sync_all().await?;

        let meta = ObjectMetadata {
            full_path: key.to_string(),
            name: key.to_string(),
            size: total_bytes,
            content_type,
            etag: etag_of(&data),
            updated: Utc::now(),
            custom_metadata,
        };

        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| AppError::StorageError(format!("Cannot encode metadata: {}", e)))?;
        fs::write(self.object_meta_path(key), json).await?;

        tracing::info!(
            key = %key,
            size_bytes = total_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored object"
        );
        Ok(meta)
    }

    async fn download(&self, key: &str) -> AppResult<Bytes> {
        let path = self.ensure_exists(key).await?;
        let data = fs::read(&path).await?;
        tracing::debug!(key = %key, size_bytes = data.len(), "Read object");
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.ensure_exists(key).await?;
        fs::remove_file(&path).await?;

        let meta_path = self.object_meta_path(key);
        if fs::try_exists(&meta_path).await.unwrap_or(false) {
            fs::remove_file(&meta_path).await?;
        }

        tracing::info!(key = %key, "Deleted object");
        Ok(())
    }
}

pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }
    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
