//! Book search, lookup and analysis endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use safereads_common::config::CacheStrategy;
use safereads_common::models::{Analysis, Book, SensitivitySettings};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{track, AuthUser};
use crate::db::{books, profiles, search_history};
use crate::services::{detect_author, AuthorMatch, CoverSearch, VerdictSource};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorSearchParams {
    pub name: String,
    pub max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub books: Vec<Book>,
    /// Present when most results share one author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_match: Option<AuthorMatch>,
}

/// Cover photo, base64-encoded
#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    pub image_base64: String,
    pub mime_type: String,
    pub max_results: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisParams {
    /// Explicit sensitivity profile; defaults to the caller's default profile
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: Analysis,
    pub cached: bool,
    pub source: VerdictSource,
}

/// GET /api/books/search?q=&max_results=
pub async fn search_books(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let books = track(&state, state.resolver.search(&params.q, params.max_results).await).await?;
    let author_match = detect_author(&books);

    let result_count = books.len() as i64;
    if let Err(e) =
        search_history::record_search(&state.db, &caller.user_id, params.q.trim(), result_count).await
    {
        tracing::warn!(user_id = %caller.user_id, error = %e, "Failed to record search history");
    }

    Ok(Json(SearchResponse {
        books,
        author_match,
    }))
}

/// GET /api/books/search/author?name=&max_results=
pub async fn search_author(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(params): Query<AuthorSearchParams>,
) -> ApiResult<Json<Vec<Book>>> {
    let books = track(
        &state,
        state
            .resolver
            .search_by_author(&params.name, params.max_results)
            .await,
    )
    .await?;
    Ok(Json(books))
}

/// POST /api/books/identify
pub async fn identify_cover(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(payload): Json<IdentifyRequest>,
) -> ApiResult<Json<CoverSearch>> {
    let found = track(
        &state,
        state
            .resolver
            .identify_cover(&payload.image_base64, &payload.mime_type, payload.max_results)
            .await,
    )
    .await?;
    Ok(Json(found))
}

/// GET /api/books/:id
pub async fn get_book(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Book>> {
    let book = books::load_book(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Book {}", id)))?;
    Ok(Json(book))
}

/// GET /api/books/:id/analysis
///
/// Cache lookup only; never invokes the model or touches quota.
pub async fn get_analysis(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<AnalysisParams>,
) -> ApiResult<Json<Analysis>> {
    let profile = resolve_profile(&state, &caller, params.profile_id).await?;

    let analysis = state
        .engine
        .peek(id, profile.as_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Analysis for book {}", id)))?;
    Ok(Json(analysis))
}

/// POST /api/books/:id/analysis
///
/// 1. Cache hit: returned without consulting quota
/// 2. Miss: entitlement check, engine run, quota charged once for a model result
pub async fn analyze_book(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<AnalysisParams>,
) -> ApiResult<Json<AnalysisResponse>> {
    ensure_book_exists(&state, id).await?;
    let profile = resolve_profile(&state, &caller, params.profile_id).await?;

    if let Some(cached) = state.engine.peek(id, profile.as_ref()).await? {
        tracing::debug!(book_id = %id, "Analysis served from cache");
        return Ok(Json(AnalysisResponse {
            analysis: cached,
            cached: true,
            source: VerdictSource::Cache,
        }));
    }

    state.entitlement.require_access(&caller.user_id).await?;

    let outcome = track(&state, state.engine.analyze(id, profile.as_ref()).await).await?;
    if outcome.is_fresh() {
        state.entitlement.increment_count(&caller.user_id).await?;
    }

    Ok(Json(AnalysisResponse {
        cached: outcome.source == VerdictSource::Cache,
        source: outcome.source,
        analysis: outcome.analysis,
    }))
}

/// POST /api/books/:id/reanalysis
pub async fn reanalyze_book(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<AnalysisParams>,
) -> ApiResult<Json<AnalysisResponse>> {
    ensure_book_exists(&state, id).await?;
    let profile = resolve_profile(&state, &caller, params.profile_id).await?;

    state.entitlement.require_access(&caller.user_id).await?;

    let outcome = track(&state, state.engine.reanalyze(id, profile.as_ref()).await).await?;
    if outcome.is_fresh() {
        state.entitlement.increment_count(&caller.user_id).await?;
    }

    tracing::info!(book_id = %id, verdict = %outcome.analysis.verdict, "Book re-analyzed");

    Ok(Json(AnalysisResponse {
        cached: false,
        source: outcome.source,
        analysis: outcome.analysis,
    }))
}

async fn ensure_book_exists(state: &AppState, id: Uuid) -> ApiResult<()> {
    books::load_book(&state.db, id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Book {}", id)))
}

/// Sensitivity settings keying this request's analysis
///
/// An explicit profile must belong to the caller. Without one, keyed mode
/// falls back to the caller's default profile.
async fn resolve_profile(
    state: &AppState,
    caller: &AuthUser,
    profile_id: Option<Uuid>,
) -> ApiResult<Option<SensitivitySettings>> {
    if let Some(profile_id) = profile_id {
        let profile = profiles::load_profile(&state.db, profile_id)
            .await?
            .filter(|p| p.user_id == caller.user_id)
            .ok_or_else(|| ApiError::NotFound(format!("Profile {}", profile_id)))?;
        return Ok(Some(profile.settings));
    }

    match state.engine.strategy() {
        CacheStrategy::ProfileIndependent => Ok(None),
        CacheStrategy::ProfileKeyed => Ok(profiles::load_default_profile(&state.db, &caller.user_id)
            .await?
            .map(|p| p.settings)),
    }
}

/// Build book routes
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/api/books/search", get(search_books))
        .route("/api/books/search/author", get(search_author))
        .route("/api/books/identify", post(identify_cover))
        .route("/api/books/:id", get(get_book))
        .route("/api/books/:id/analysis", get(get_analysis).post(analyze_book))
        .route("/api/books/:id/reanalysis", post(reanalyze_book))
}
