//! Object-store callbacks.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::DriveRepository;
use crate::web::error::ApiError;
use crate::web::signature::{self, SIGNATURE_HEADER};

use super::AppState;

/// Payload sent by the object store once an object landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadedPayload {
    pub key: String,
    /// Stored object size in bytes.
    pub size: i64,
    pub bucket: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookResponse {
    pub status: String,
}

/// POST /api/webhook/file/uploaded - Confirm an uploaded object.
///
/// The signature covers the raw body, so the body is parsed only after it is
/// verified.
pub async fn file_uploaded(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(ApiError::invalid_hash)?;
    signature::verify(&state.webhook_secret, &body, provided)?;

    let payload: FileUploadedPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid payload: {e}")))?;
    if payload.size < 0 {
        return Err(ApiError::bad_request("Invalid payload: negative size"));
    }

    let repo = DriveRepository::new(state.db.pool());
    let file = repo.finalize_upload(&payload.key, payload.size).await?;

    tracing::info!(
        key = %file.key,
        bucket = %payload.bucket,
        size = file.size,
        "Upload finalized"
    );

    Ok(Json(WebhookResponse {
        status: "SUCCESS".to_string(),
    }))
}
