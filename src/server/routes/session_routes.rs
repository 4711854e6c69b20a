//! Session lifecycle and file routes

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{find_session, ApiError, ApiResponse};
use crate::models::GeneratedFile;
use crate::server::ServerAppState;
use crate::session::{Session, SessionInfo};
use crate::sync::{AppliedChanges, SyncReport};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Files to start from
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    pub path: String,
}

/// Paths a file edit actually changed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

impl From<AppliedChanges> for EditResult {
    fn from(changes: AppliedChanges) -> Self {
        Self {
            changed: changes.upserted.into_iter().map(|f| f.path).collect(),
            removed: changes.removed,
        }
    }
}

pub async fn create_session(
    State(state): State<ServerAppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let session = state
        .sessions
        .insert(Session::with_channel(&state.sync_settings))
        .await;

    for file in &request.files {
        session
            .write_file(&file.path, &file.content)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    log::info!(
        "Created session {} with {} file(s)",
        session.id(),
        request.files.len()
    );
    Ok(ApiResponse::ok(session.info().await))
}

pub async fn list_sessions(
    State(state): State<ServerAppState>,
) -> Json<ApiResponse<Vec<SessionInfo>>> {
    ApiResponse::ok(state.sessions.list().await)
}

pub async fn delete_session(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    if state.sessions.remove(&id).await {
        Ok(ApiResponse::ok(true))
    } else {
        Err(ApiError::not_found(format!("Session not found: {}", id)))
    }
}

pub async fn get_files(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<GeneratedFile>>>, ApiError> {
    let session = find_session(&state, &id).await?;
    Ok(ApiResponse::ok(session.files().await))
}

pub async fn write_file(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
    Json(request): Json<WriteFileRequest>,
) -> Result<Json<ApiResponse<EditResult>>, ApiError> {
    if request.path.trim().is_empty() {
        return Err(ApiError::bad_request("Missing argument: path"));
    }
    let session = find_session(&state, &id).await?;
    let changes = session
        .write_file(&request.path, &request.content)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(ApiResponse::ok(changes.into()))
}

pub async fn delete_file(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
    Json(request): Json<DeleteFileRequest>,
) -> Result<Json<ApiResponse<EditResult>>, ApiError> {
    let session = find_session(&state, &id).await?;
    let changes = session
        .delete_file(&request.path)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(ApiResponse::ok(changes.into()))
}

/// Push pending changes to the sandbox without waiting for the debounce
pub async fn flush_sync(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let session = find_session(&state, &id).await?;
    let report = session
        .flush()
        .await
        .map_err(|e| ApiError::new(axum::http::StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(ApiResponse::ok(report))
}

pub async fn cancel_generation(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let session = find_session(&state, &id).await?;
    Ok(ApiResponse::ok(session.cancel_generation()))
}
