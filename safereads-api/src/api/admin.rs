//! Admin endpoints
//!
//! Every handler takes [`AdminUser`], so callers off the allow-list get 403.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use safereads_common::models::{SubscriptionStatus, UserRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use super::AdminUser;
use crate::db::{settings, stats, users};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_USER_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub status: Option<SubscriptionStatus>,
    /// Unix seconds
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GrantLifetimeRequest {
    pub email: String,
}

/// Request payload for setting the OpenAI API key
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<stats::ServiceStats>> {
    Ok(Json(stats::collect_stats(&state.db).await?))
}

/// GET /api/admin/users?limit=
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ListUsersParams>,
) -> ApiResult<Json<Vec<UserRecord>>> {
    let limit = params.limit.unwrap_or(DEFAULT_USER_LIMIT);
    Ok(Json(users::list_users(&state.db, limit).await?))
}

/// PUT /api/admin/users/:id/subscription
pub async fn update_subscription(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<UserRecord>> {
    users::update_subscription(
        &state.db,
        &user_id,
        payload.status,
        payload.current_period_end,
    )
    .await?;

    info!(
        admin = %admin.user.email,
        user_id = %user_id,
        status = payload.status.map(|s| s.as_str()).unwrap_or("none"),
        "Subscription updated"
    );

    let user = users::load_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", user_id)))?;
    Ok(Json(user))
}

/// POST /api/admin/grant-lifetime
pub async fn grant_lifetime(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<GrantLifetimeRequest>,
) -> ApiResult<Json<UserRecord>> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email must not be empty".to_string()));
    }

    let user = users::grant_lifetime(&state.db, email).await?;
    info!(admin = %admin.user.email, user_id = %user.id, "Lifetime access granted");
    Ok(Json(user))
}

/// POST /api/admin/settings/openai_api_key
///
/// 1. Validate key (non-empty, non-whitespace)
/// 2. Write to database (authoritative)
/// 3. Hand the key to the live model client
/// 4. Sync to TOML (best-effort backup)
pub async fn set_openai_api_key(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }
    let api_key = payload.api_key.trim().to_string();

    settings::set_openai_api_key(&state.db, api_key.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;

    if let Some(client) = &state.openai {
        client.set_api_key(api_key.clone()).await;
    }

    info!("OpenAI API key configured via admin endpoint");

    if let Some(toml_path) = &state.config_path {
        let mut updates = HashMap::new();
        updates.insert(settings::OPENAI_API_KEY.to_string(), api_key);

        if let Err(e) = crate::config::sync_settings_to_toml(updates, toml_path).await {
            warn!("TOML sync failed (database write succeeded): {}", e);
        }
    }

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "OpenAI API key configured successfully".to_string(),
    }))
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/subscription", put(update_subscription))
        .route("/api/admin/grant-lifetime", post(grant_lifetime))
        .route("/api/admin/settings/openai_api_key", post(set_openai_api_key))
}
