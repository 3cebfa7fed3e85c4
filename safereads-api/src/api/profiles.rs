//! Single-profile endpoints (owner only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use safereads_common::models::{Profile, SensitivitySettings};
use serde::Deserialize;
use uuid::Uuid;

use super::AuthUser;
use crate::db::profiles;
use crate::{ApiError, ApiResult, AppState};

/// Partial update; omitted fields stay unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub settings: Option<SensitivitySettings>,
}

/// PUT /api/profiles/:id
pub async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    load_owned(&state, &caller, id).await?;

    let name = payload.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(ApiError::BadRequest("Profile name must not be empty".to_string()));
    }

    let profile = profiles::update_profile(&state.db, id, name, payload.settings.as_ref()).await?;
    Ok(Json(profile))
}

/// DELETE /api/profiles/:id
pub async fn delete_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_owned(&state, &caller, id).await?;
    profiles::delete_profile(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/profiles/:id/default
pub async fn set_default_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Profile>> {
    load_owned(&state, &caller, id).await?;
    Ok(Json(profiles::set_default_profile(&state.db, id).await?))
}

/// Someone else's profile looks the same as a missing one
async fn load_owned(state: &AppState, caller: &AuthUser, id: Uuid) -> ApiResult<Profile> {
    profiles::load_profile(&state.db, id)
        .await?
        .filter(|p| p.user_id == caller.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("Profile {}", id)))
}

/// Build profile routes
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles/:id", put(update_profile).delete(delete_profile))
        .route("/api/profiles/:id/default", post(set_default_profile))
}
