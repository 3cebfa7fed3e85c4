//! Caller identity extractors
//!
//! Authentication happens in the auth proxy in front of the service; it
//! forwards the verified user id in the `x-user-id` header.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use safereads_common::models::UserRecord;

use crate::db::users;
use crate::{ApiError, AppState};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?;

        Ok(Self {
            user_id: user_id.to_string(),
        })
    }
}

/// Authenticated caller on the admin allow-list
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: UserRecord,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        let state = AppState::from_ref(state);

        let user = users::load_user(&state.db, &caller.user_id)
            .await?
            .filter(|user| state.admins.is_admin(user))
            .ok_or_else(|| {
                tracing::warn!(user_id = %caller.user_id, "Admin endpoint refused");
                ApiError::Forbidden("Admin access required".to_string())
            })?;

        Ok(Self { user })
    }
}

/// Load the caller's user row; callers must sync identity first
pub async fn require_user(state: &AppState, caller: &AuthUser) -> Result<UserRecord, ApiError> {
    users::load_user(&state.db, &caller.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} (sync identity first)", caller.user_id)))
}
