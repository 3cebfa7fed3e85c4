//! Recent analyses feed

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use safereads_common::models::AnalysisWithBook;
use serde::Deserialize;

use crate::db::analyses;
use crate::{ApiResult, AppState};

const DEFAULT_RECENT_COUNT: u32 = 10;
const MAX_RECENT_COUNT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub count: Option<u32>,
}

/// GET /api/analyses/recent?count=
pub async fn recent_analyses(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<Vec<AnalysisWithBook>>> {
    let count = params
        .count
        .unwrap_or(DEFAULT_RECENT_COUNT)
        .clamp(1, MAX_RECENT_COUNT);

    Ok(Json(analyses::list_recent(&state.db, count).await?))
}

/// Build analysis feed routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/api/analyses/recent", get(recent_analyses))
}
