use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Custom metadata field stamped on every upload
pub const UPLOADED_DATE_KEY: &str = "uploadedDate";

/// Metadata the storage backend keeps for one object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub full_path: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub etag: String,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub custom_metadata: HashMap<String, String>,
}

/// A file the user picked or dropped, waiting for the next upload batch
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub name: String,
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// One progress tick reported by the storage backend while an upload runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

/// What the progress indicator shows; `None` at the call site means hidden
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadProgress {
    pub file_name: String,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub percent: f64,
}

impl UploadProgress {
    pub fn new(file_name: &str, tick: TransferProgress) -> Self {
        let percent = if tick.total_bytes == 0 {
            100.0
        } else {
            tick.bytes_transferred as f64 / tick.total_bytes as f64 * 100.0
        };
        Self {
            file_name: file_name.to_string(),
            bytes_transferred: tick.bytes_transferred,
            total_bytes: tick.total_bytes,
            percent,
        }
    }
}

/// A stored object as observed by the last listing fetch
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub full_path: String,
    pub name: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub date_label: String,
    pub download_url: String,
    pub size: u64,
    pub size_human: String,
    pub content_type: String,
}

/// Enabled state of the page actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionState {
    pub upload_enabled: bool,
    pub download_enabled: bool,
    pub delete_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub files: Vec<StoredObject>,
    pub actions: ActionState,
}

#[derive(Debug, Serialize)]
pub struct StagingResponse {
    pub pending: Vec<String>,
    pub preview: String,
    pub actions: ActionState,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetCheckedRequest {
    pub key: String,
    pub checked: bool,
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub select_all: bool,
    pub selected: BTreeSet<String>,
    pub actions: ActionState,
}

#[derive(Debug, Serialize)]
pub struct DirectDownloadResponse {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteFailure {
    pub key: String,
    pub message: String,
}

/// Outcome of a delete batch; failures never abort their siblings
#[derive(Debug, Serialize)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
    pub files: Vec<StoredObject>,
    pub actions: ActionState,
}
