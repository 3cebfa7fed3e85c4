//! Caller-scoped endpoints: identity sync, entitlement, history, profiles

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use safereads_common::models::{AccessStatus, Profile, SearchHistoryEntry, SensitivitySettings, UserRecord};
use serde::{Deserialize, Serialize};

use super::auth::require_user;
use super::AuthUser;
use crate::db::{profiles, search_history, users};
use crate::services::SubscriptionDetails;
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Identity as reported by the auth provider
#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ClearHistoryResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub name: String,
    #[serde(flatten)]
    pub settings: SensitivitySettings,
}

/// POST /api/users/me
pub async fn sync_me(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<SyncUserRequest>,
) -> ApiResult<Json<UserRecord>> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email must not be empty".to_string()));
    }

    let user = users::sync_user(&state.db, &caller.user_id, email, payload.name.as_deref()).await?;
    tracing::debug!(user_id = %user.id, "User identity synced");
    Ok(Json(user))
}

/// GET /api/users/me/access
pub async fn my_access(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<AccessStatus>> {
    Ok(Json(state.entitlement.check_access(&caller.user_id).await?))
}

/// GET /api/users/me/subscription
pub async fn my_subscription(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<SubscriptionDetails>> {
    Ok(Json(
        state.entitlement.subscription_details(&caller.user_id).await?,
    ))
}

/// GET /api/users/me/history
pub async fn my_history(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<SearchHistoryEntry>>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(
        search_history::list_history(&state.db, &caller.user_id, limit).await?,
    ))
}

/// DELETE /api/users/me/history
pub async fn clear_my_history(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<ClearHistoryResponse>> {
    let deleted = search_history::clear_history(&state.db, &caller.user_id).await?;
    tracing::info!(user_id = %caller.user_id, deleted, "Search history cleared");
    Ok(Json(ClearHistoryResponse { deleted }))
}

/// GET /api/users/me/profiles
pub async fn my_profiles(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<Profile>>> {
    Ok(Json(profiles::list_profiles(&state.db, &caller.user_id).await?))
}

/// POST /api/users/me/profiles
pub async fn create_my_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<CreateProfileRequest>,
) -> ApiResult<(StatusCode, Json<Profile>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Profile name must not be empty".to_string()));
    }

    let user = require_user(&state, &caller).await?;
    let profile = profiles::create_profile(&state.db, &user.id, name, &payload.settings).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Build caller-scoped routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", post(sync_me))
        .route("/api/users/me/access", get(my_access))
        .route("/api/users/me/subscription", get(my_subscription))
        .route(
            "/api/users/me/history",
            get(my_history).delete(clear_my_history),
        )
        .route(
            "/api/users/me/profiles",
            get(my_profiles).post(create_my_profile),
        )
}
