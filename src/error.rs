use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Text shown to the user when a download is requested with nothing checked
pub const NOTHING_SELECTED_ALERT: &str = "Please select the files to download.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Object '{0}' not found")]
    ObjectNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidObjectKey(String),

    #[error("{}", NOTHING_SELECTED_ALERT)]
    NothingSelected,

    #[error("No files are staged for upload")]
    NothingStaged,

    #[error("Upload of '{name}' failed: {reason}")]
    UploadFailed { name: String, reason: String },

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ObjectNotFound(_) => (StatusCode::NOT_FOUND, "NoSuchKey"),
            AppError::InvalidObjectKey(_) => (StatusCode::BAD_REQUEST, "InvalidObjectKey"),
            AppError::NothingSelected => (StatusCode::BAD_REQUEST, "NothingSelected"),
            AppError::NothingStaged => (StatusCode::BAD_REQUEST, "NothingStaged"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            AppError::UploadFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "UploadFailed"),
            AppError::ArchiveError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ArchiveError"),
            AppError::StorageError(_) | AppError::IoError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: code.to_string(),
            code: code.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(e: zip::result::ZipError) -> Self {
        AppError::ArchiveError(e.to_string())
    }
}
