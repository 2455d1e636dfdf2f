//! REST endpoints.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::config::UploadConfig;
use crate::error::SessionError;
use crate::pipeline::ExportRequest;
use crate::session::Session;

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NotFound { .. } => StatusCode::NOT_FOUND,
            SessionError::MissingSource { .. }
            | SessionError::UnsupportedFile { .. }
            | SessionError::OutsideUploadDir { .. } => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "paper-notes",
        "api_key_configured": state.api_key_configured,
        "services": {
            "transcription": state.api_key_configured,
            "summarization": state.api_key_configured,
            "export": true
        }
    }))
}

// ── Sessions ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct CreateSessionRequest {
    /// Audio file already stored by the upload layer.
    source_path: PathBuf,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

pub(super) async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, SessionError> {
    let id = body
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if !state.uploads.is_allowed(&body.source_path) {
        return Err(SessionError::UnsupportedFile {
            extension: UploadConfig::extension_of(&body.source_path),
            allowed: state.uploads.allowed_extensions.join(", "),
        });
    }

    let source_path = tokio::fs::canonicalize(&body.source_path)
        .await
        .map_err(|_| SessionError::MissingSource { id: id.clone() })?;
    contain_in_upload_dir(&source_path, &state.uploads).await?;

    let metadata = tokio::fs::metadata(&source_path)
        .await
        .map_err(|_| SessionError::MissingSource { id: id.clone() })?;
    let max_bytes = state.uploads.max_file_size_mb * 1024 * 1024;
    if metadata.len() > max_bytes {
        return Ok((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(serde_json::json!({
                "error": format!("File too large, maximum is {}MB", state.uploads.max_file_size_mb)
            })),
        ));
    }

    let file_name = source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = body
        .title
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| file_name.clone());

    state
        .orchestrator()
        .create_session(Session::new(&id, title).with_source(&source_path, file_name))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"session_id": id, "message": "Session created"})),
    ))
}

/// Reject canonical source paths that do not sit under the upload directory.
async fn contain_in_upload_dir(
    source: &FsPath,
    uploads: &UploadConfig,
) -> Result<(), SessionError> {
    let outside = || SessionError::OutsideUploadDir {
        path: source.display().to_string(),
    };
    let upload_dir = tokio::fs::canonicalize(&uploads.upload_dir)
        .await
        .map_err(|_| outside())?;
    if source.starts_with(&upload_dir) {
        Ok(())
    } else {
        Err(outside())
    }
}

pub(super) async fn process_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    state.driver.start_job(&id).await?;
    info!(job_id = %id, "Processing scheduled");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"message": "Processing started", "session_id": id})),
    ))
}

pub(super) async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SessionError> {
    let result = state.orchestrator().get_result(&id).await?;
    Ok(Json(result))
}

pub(super) async fn cleanup_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.orchestrator().cleanup_session(&id).await;
    Json(serde_json::json!({"status": "cleaned", "session_id": id}))
}

// ── Export ──────────────────────────────────────────────────────────────

pub(super) async fn export_note(
    State(state): State<AppState>,
    Json(body): Json<ExportRequest>,
) -> impl IntoResponse {
    Json(state.driver.export_note(body).await)
}
