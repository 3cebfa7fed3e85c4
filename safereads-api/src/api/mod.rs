//! HTTP API handlers for safereads-api

pub mod admin;
pub mod analyses;
pub mod auth;
pub mod books;
pub mod health;
pub mod profiles;
pub mod users;

pub use admin::admin_routes;
pub use analyses::analysis_routes;
pub use auth::{AdminUser, AuthUser};
pub use books::book_routes;
pub use health::health_routes;
pub use profiles::profile_routes;
pub use users::user_routes;

use crate::{ApiError, ApiResult, AppState};

/// Convert a service result, remembering server-side failures for `/health`
pub(crate) async fn track<T>(state: &AppState, result: safereads_common::Result<T>) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let err = ApiError::from(e);
            if err.status().is_server_error() {
                state.record_error(err.to_string()).await;
            }
            Err(err)
        }
    }
}
