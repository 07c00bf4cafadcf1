//! Drive API handlers used by the upload client.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{DriveRepository, NewFolder, NewPendingUpload};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFolderResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub name: String,
    pub size: i64,
    pub folder_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Where the client PUTs the file body.
    pub url: String,
    /// Object key the store reports back on completion.
    pub key: String,
}

/// POST /api/folders - Create a folder for the session user.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<CreateFolderResponse>), ApiError> {
    let mut new_folder = NewFolder::new(req.name, user_id);
    new_folder.parent_id = req.parent_id;

    let repo = DriveRepository::new(state.db.pool());
    let folder = repo.create_folder(&new_folder).await?;
    tracing::debug!(id = %folder.id, parent = ?folder.parent_id, "Folder created");

    Ok((StatusCode::CREATED, Json(CreateFolderResponse { id: folder.id })))
}

/// POST /api/files/upload - Authorize an upload and hand out its URL.
pub async fn request_upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let repo = DriveRepository::new(state.db.pool());
    let pending = repo
        .register_pending_upload(&NewPendingUpload {
            name: req.name,
            size: req.size,
            folder_id: req.folder_id,
            user_id,
        })
        .await?;
    tracing::debug!(key = %pending.key, size = pending.size, "Upload authorized");

    Ok(Json(UploadResponse {
        url: state.object_url(&pending.key),
        key: pending.key,
    }))
}
