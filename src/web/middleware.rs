//! Bearer session authentication for the drive API.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::db::DriveRepository;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Authenticated user extractor.
///
/// Resolves the `Authorization: Bearer <token>` header against the session
/// table and yields the owning user id.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .ok_or_else(|| ApiError::unauthorized("Missing session token"))?;

            let repo = DriveRepository::new(state.db.pool());
            let user_id = repo
                .session_user(token)
                .await?
                .ok_or_else(|| ApiError::unauthorized("Invalid session token"))?;

            Ok(AuthUser(user_id))
        })
    }
}
