use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::controller::DownloadOutcome;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::AppState;

// ─── REST API Routes ─────────────────────────────────────────────

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Listing
        .route("/files", get(list_files))
        // Staging and upload
        .route("/staging", get(get_staging).post(stage_files))
        .route("/upload", post(upload_pending))
        .route("/upload/progress", get(upload_progress))
        // Selection
        .route("/selection", get(get_selection).post(set_checked))
        .route("/selection/all", post(toggle_select_all))
        // Download and delete act on the current selection
        .route("/download", post(download_selected))
        .route("/delete", post(delete_selected))
}

/// Download-URL target. Wildcard routes must be registered at top level
pub fn object_routes() -> Router<Arc<AppState>> {
    Router::new().route("/objects/*key", get(get_object))
}

// ─── Listing ─────────────────────────────────────────────────────

async fn list_files(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let files = state.manager.list_files().await?;
    Ok(Json(ListingResponse {
        files,
        actions: state.manager.actions(),
    }))
}

// ─── Staging & Upload ────────────────────────────────────────────

fn staging_response(state: &AppState) -> StagingResponse {
    StagingResponse {
        pending: state.manager.pending_names(),
        preview: state.manager.staging_preview(),
        actions: state.manager.actions(),
    }
}

async fn get_staging(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(staging_response(&state))
}

async fn stage_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::InvalidRequest(format!("Multipart error: {}", e))
    })? {
        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("upload-{}", uuid::Uuid::new_v4()));

        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(|e| {
            AppError::InvalidRequest(format!("Failed to read upload data: {}", e))
        })?;

        files.push(PendingUpload { name, data, content_type });
    }

    tracing::info!(count = files.len(), "Staged files");
    state.manager.stage(files);
    Ok(Json(staging_response(&state)))
}

async fn upload_pending(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let uploaded = state.manager.upload_pending().await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { uploaded })))
}

async fn upload_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.current_progress())
}

// ─── Selection ───────────────────────────────────────────────────

fn selection_response(state: &AppState) -> SelectionResponse {
    SelectionResponse {
        select_all: state.manager.select_all_flag(),
        selected: state.manager.selection(),
        actions: state.manager.actions(),
    }
}

async fn get_selection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(selection_response(&state))
}

async fn set_checked(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetCheckedRequest>,
) -> impl IntoResponse {
    state.manager.set_checked(&body.key, body.checked);
    Json(selection_response(&state))
}

async fn toggle_select_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.manager.toggle_select_all();
    Json(selection_response(&state))
}

// ─── Download & Delete ───────────────────────────────────────────

async fn download_selected(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    match state.manager.download_selected().await? {
        DownloadOutcome::Direct { url, filename } => {
            Ok(Json(DirectDownloadResponse { url, filename }).into_response())
        }
        DownloadOutcome::Archive { filename, bytes } => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            bytes,
        )
            .into_response()),
    }
}

async fn delete_selected(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let outcome = state.manager.delete_selected().await?;
    Ok(Json(DeleteReport {
        deleted: outcome.deleted,
        failed: outcome.failed,
        files: outcome.files,
        actions: state.manager.actions(),
    }))
}

// ─── Objects ─────────────────────────────────────────────────────

async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> AppResult<Response> {
    let key = key.trim_start_matches('/');
    let storage = state.manager.storage();
    let meta = storage.metadata(key).await?;
    let data = storage.download(key).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, meta.content_type),
            (header::ETAG, meta.etag),
            (header::LAST_MODIFIED, meta.updated.to_rfc2822()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename*=UTF-8''{}", urlencoding::encode(key)),
            ),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::controller::FileManager;
    use crate::testing::{pending, ScriptedStorage};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    async fn app() -> (TempDir, Arc<ScriptedStorage>, Arc<AppState>, Router) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(ScriptedStorage::new(dir.path()).await);
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3210,
            data_dir: dir.path().to_string_lossy().to_string(),
            public_url: None,
            max_upload_size: 1024 * 1024,
        };
        let state = Arc::new(AppState {
            manager: FileManager::new(storage.clone()),
            config,
        });
        let router = crate::build_router(state.clone());
        (dir, storage, state, router)
    }

    async fn seed(state: &AppState, names: &[&str]) {
        state
            .manager
            .stage(names.iter().map(|n| pending(n, n.as_bytes())).collect());
        state.manager.upload_pending().await.unwrap();
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn listing_returns_newest_first() {
        let (_dir, _storage, state, router) = app().await;
        seed(&state, &["a.txt", "b.txt"]).await;

        let response = router
            .oneshot(Request::get("/api/files").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let files = body["files"].as_array().unwrap();
        assert_eq!(files[0]["full_path"], "b.txt");
        assert_eq!(files[1]["full_path"], "a.txt");
        assert_eq!(body["actions"]["download_enabled"], false);
    }

    #[tokio::test]
    async fn download_without_selection_is_an_alert() {
        let (_dir, _storage, _state, router) = app().await;

        let response = router
            .oneshot(Request::post("/api/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["code"], "NothingSelected");
        assert_eq!(body["message"], crate::error::NOTHING_SELECTED_ALERT);
    }

    #[tokio::test]
    async fn checking_a_row_enables_actions() {
        let (_dir, _storage, state, router) = app().await;
        seed(&state, &["a.txt"]).await;

        let response = router
            .oneshot(post_json("/api/selection", serde_json::json!({"key": "a.txt", "checked": true})))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["selected"], serde_json::json!(["a.txt"]));
        assert_eq!(body["actions"]["delete_enabled"], true);
    }

    #[tokio::test]
    async fn checking_an_unlisted_key_changes_nothing() {
        let (_dir, _storage, state, router) = app().await;
        seed(&state, &["a.txt"]).await;

        let response = router
            .oneshot(post_json("/api/selection", serde_json::json!({"key": "ghost.txt", "checked": true})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["selected"], serde_json::json!([]));
        assert_eq!(body["actions"]["download_enabled"], false);
    }

    #[tokio::test]
    async fn single_download_returns_its_url() {
        let (_dir, _storage, state, router) = app().await;
        seed(&state, &["report.pdf"]).await;
        state.manager.set_checked("report.pdf", true);

        let response = router
            .oneshot(Request::post("/api/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["filename"], "report.pdf");
        assert_eq!(body["url"], "http://localhost:3210/objects/report.pdf");
    }

    #[tokio::test]
    async fn multi_download_is_a_zip_attachment() {
        let (_dir, _storage, state, router) = app().await;
        seed(&state, &["a.txt", "b.txt"]).await;
        state.manager.set_checked("a.txt", true);
        state.manager.set_checked("b.txt", true);

        let response = router
            .oneshot(Request::post("/api/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"files.zip\""
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn delete_reports_failures_and_refreshes() {
        let (_dir, storage, state, router) = app().await;
        storage.fail_delete_of("b.txt");
        seed(&state, &["a.txt", "b.txt", "c.txt"]).await;
        state.manager.toggle_select_all();

        let response = router
            .oneshot(Request::post("/api/delete").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["deleted"], serde_json::json!(["a.txt", "c.txt"]));
        assert_eq!(body["failed"][0]["key"], "b.txt");
        assert_eq!(body["files"].as_array().unwrap().len(), 1);
        assert_eq!(body["actions"]["delete_enabled"], false);
    }

    #[tokio::test]
    async fn objects_are_served_as_attachments() {
        let (_dir, _storage, state, router) = app().await;
        seed(&state, &["notes.txt"]).await;

        let response = router
            .oneshot(Request::get("/objects/notes.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename*=UTF-8''notes.txt"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"notes.txt");
    }

    #[tokio::test]
    async fn missing_objects_are_404() {
        let (_dir, _storage, _state, router) = app().await;
        let response = router
            .oneshot(Request::get("/objects/nope.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_with_nothing_staged_is_rejected() {
        let (_dir, _storage, _state, router) = app().await;
        let response = router
            .oneshot(Request::post("/api/upload").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
