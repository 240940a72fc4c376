use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use futures::future::{join_all, try_join_all};
use tokio::sync::watch;

use crate::archive::{ArchiveBuilder, ARCHIVE_FILENAME};
use crate::error::{AppError, AppResult};
use crate::listing::{sort_newest_first, to_stored_object};
use crate::models::{
    ActionState, DeleteFailure, PendingUpload, StoredObject, TransferProgress, UploadProgress,
    UPLOADED_DATE_KEY,
};
use crate::storage::{validate_object_key, ObjectStorage};

/// What a download request resolved to
#[derive(Debug)]
pub enum DownloadOutcome {
    /// One object; the browser fetches it straight from its download URL
    Direct { url: String, filename: String },
    /// Several objects packed into a single zip
    Archive { filename: String, bytes: Vec<u8> },
}

/// Per-key outcome of a delete batch, followed by the refreshed listing
#[derive(Debug)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<DeleteFailure>,
    pub files: Vec<StoredObject>,
}

#[derive(Default)]
struct PageState {
    pending: Vec<PendingUpload>,
    selection: BTreeSet<String>,
    select_all: bool,
    /// Keys rendered by the last listing fetch
    rendered: BTreeSet<String>,
}

impl PageState {
    fn actions(&self) -> ActionState {
        let has_selection = !self.selection.is_empty();
        ActionState {
            upload_enabled: !self.pending.is_empty(),
            download_enabled: has_selection,
            delete_enabled: has_selection,
        }
    }

    /// Keys missing from the last listing have no checkbox and are ignored
    fn set_checked(&mut self, key: &str, checked: bool) -> ActionState {
        if checked {
            if !self.rendered.contains(key) {
                tracing::debug!(key = %key, "Ignoring check of a key that is not listed");
                return self.actions();
            }
            self.selection.insert(key.to_string());
        } else {
            self.selection.remove(key);
        }
        self.actions()
    }
}

/// Owns the page's transient state and runs the upload, listing,
/// download and delete flows against the bucket.
pub struct FileManager {
    storage: Arc<dyn ObjectStorage>,
    state: Mutex<PageState>,
    /// Held for the whole of an upload batch so batches never interleave
    upload_gate: tokio::sync::Mutex<()>,
    progress: watch::Sender<Option<UploadProgress>>,
}

impl FileManager {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            storage,
            state: Mutex::new(PageState::default()),
            upload_gate: tokio::sync::Mutex::new(()),
            progress,
        }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn actions(&self) -> ActionState {
        self.state().actions()
    }

    // ─── Staging ──────────────────────────────────────────────────

    /// Append dropped or picked files to the pending list
    pub fn stage(&self, files: Vec<PendingUpload>) -> ActionState {
        let mut state = self.state();
        state.pending.extend(files);
        state.actions()
    }

    pub fn pending_names(&self) -> Vec<String> {
        self.state().pending.iter().map(|f| f.name.clone()).collect()
    }

    /// Text for the preview panel listing what the next upload will add
    pub fn staging_preview(&self) -> String {
        let names = self.pending_names();
        if names.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| format!("{}. {}", idx + 1, name))
            .collect();
        format!("The following files will be added.\n\n{}", lines.join("\n"))
    }

    // ─── Upload ───────────────────────────────────────────────────

    pub fn subscribe_progress(&self) -> watch::Receiver<Option<UploadProgress>> {
        self.progress.subscribe()
    }

    pub fn current_progress(&self) -> Option<UploadProgress> {
        self.progress.borrow().clone()
    }

    /// Upload every pending file, one at a time, in the order staged.
    ///
    /// The first failure stops the batch: later files are not attempted and
    /// files already stored stay stored. A successful batch clears the
    /// pending list and reloads the page state.
    pub async fn upload_pending(&self) -> AppResult<Vec<String>> {
        let _gate = self.upload_gate.lock().await;

        let batch = self.state().pending.clone();
        if batch.is_empty() {
            return Err(AppError::NothingStaged);
        }

        let mut uploaded = Vec::with_capacity(batch.len());
        for file in &batch {
            if let Err(e) = self.upload_one(file).await {
                tracing::error!(file = %file.name, error = %e, "Upload failed");
                self.progress.send_replace(None);
                return Err(e);
            }
            uploaded.push(file.name.clone());
        }

        tracing::info!(count = uploaded.len(), "Upload batch complete");
        if let Err(e) = self.reload().await {
            tracing::error!(error = %e, "Listing refresh after upload failed");
        }
        Ok(uploaded)
    }

    async fn upload_one(&self, file: &PendingUpload) -> AppResult<()> {
        validate_object_key(&file.name)?;

        let mut custom_metadata = HashMap::new();
        custom_metadata.insert(
            UPLOADED_DATE_KEY.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        );

        self.progress.send_replace(Some(UploadProgress::new(
            &file.name,
            TransferProgress { bytes_transferred: 0, total_bytes: file.data.len() as u64 },
        )));

        let report = |tick: TransferProgress| {
            self.progress.send_replace(Some(UploadProgress::new(&file.name, tick)));
        };

        self.storage
            .upload(
                &file.name,
                file.data.clone(),
                file.content_type.as_deref(),
                custom_metadata,
                &report,
            )
            .await?;

        tracing::info!(file = %file.name, "Upload complete");
        self.progress.send_replace(None);
        Ok(())
    }

    /// Drop every piece of transient page state and fetch a fresh listing
    pub async fn reload(&self) -> AppResult<Vec<StoredObject>> {
        {
            let mut state = self.state();
            state.pending.clear();
            state.selection.clear();
            state.select_all = false;
        }
        self.list_files().await
    }

    // ─── Listing ──────────────────────────────────────────────────

    /// Fetch every object at the bucket root, newest upload first
    pub async fn list_files(&self) -> AppResult<Vec<StoredObject>> {
        let keys = self.storage.list("").await?;

        let fetches = keys.iter().map(|key| async move {
            let meta = self.storage.metadata(key).await?;
            let url = self.storage.download_url(key).await?;
            Ok::<_, AppError>(to_stored_object(meta, url))
        });
        let mut files = try_join_all(fetches).await?;
        sort_newest_first(&mut files);

        {
            let mut state = self.state();
            state.rendered = files.iter().map(|f| f.full_path.clone()).collect();
            let PageState { selection, rendered, .. } = &mut *state;
            selection.retain(|key| rendered.contains(key));
        }
        tracing::debug!(count = files.len(), "Rendered listing");
        Ok(files)
    }

    // ─── Selection ────────────────────────────────────────────────

    pub fn set_checked(&self, key: &str, checked: bool) -> ActionState {
        self.state().set_checked(key, checked)
    }

    /// Flip the select-all flag and push its new value onto every rendered row.
    ///
    /// The flag is independent of the selection: unchecking a row by hand
    /// afterwards does not reset it.
    pub fn toggle_select_all(&self) -> bool {
        let mut state = self.state();
        state.select_all = !state.select_all;
        let checked = state.select_all;
        let rendered = state.rendered.clone();
        for key in &rendered {
            state.set_checked(key, checked);
        }
        checked
    }

    pub fn select_all_flag(&self) -> bool {
        self.state().select_all
    }

    pub fn selection(&self) -> BTreeSet<String> {
        self.state().selection.clone()
    }

    // ─── Download ─────────────────────────────────────────────────

    pub async fn download_selected(&self) -> AppResult<DownloadOutcome> {
        let selected: Vec<String> = self.selection().into_iter().collect();

        match selected.as_slice() {
            [] => Err(AppError::NothingSelected),
            [key] => {
                let url = self.storage.download_url(key).await?;
                Ok(DownloadOutcome::Direct { url, filename: key.clone() })
            }
            keys => {
                let fetches = keys.iter().map(|key| async move {
                    let url = self.storage.download_url(key).await?;
                    let data = self.storage.download(key).await?;
                    tracing::debug!(key = %key, url = %url, size_bytes = data.len(), "Fetched for archive");
                    Ok::<(&String, Bytes), AppError>((key, data))
                });
                let fetched = try_join_all(fetches).await?;

                let mut archive = ArchiveBuilder::new();
                for (key, data) in &fetched {
                    archive.add_entry(key, data)?;
                }
                let entries = archive.entry_count();
                let bytes = archive.finish()?;

                tracing::info!(entries, size_bytes = bytes.len(), "Built archive");
                Ok(DownloadOutcome::Archive { filename: ARCHIVE_FILENAME.to_string(), bytes })
            }
        }
    }

    // ─── Delete ───────────────────────────────────────────────────

    /// Delete every selected object concurrently, then clear the selection
    /// and refresh the listing whatever the individual outcomes were.
    pub async fn delete_selected(&self) -> AppResult<DeleteOutcome> {
        let selected = self.selection();

        let deletes = selected.iter().map(|key| async move {
            match self.storage.delete(key).await {
                Ok(()) => {
                    tracing::info!(key = %key, "File deleted");
                    Ok(key.clone())
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "File delete failed");
                    Err(DeleteFailure { key: key.clone(), message: e.to_string() })
                }
            }
        });

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for result in join_all(deletes).await {
            match result {
                Ok(key) => deleted.push(key),
                Err(failure) => failed.push(failure),
            }
        }

        self.state().selection.clear();
        let files = self.list_files().await?;

        Ok(DeleteOutcome { deleted, failed, files })
    }
}
