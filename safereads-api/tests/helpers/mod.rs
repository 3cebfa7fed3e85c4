//! Test Helper Utilities
//!
//! Shared utilities for testing safereads-api: scripted model stubs, a
//! local upstream server standing in for Google Books and Open Library,
//! and an [`AppState`] wired to an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use safereads_api::services::{
    AdminAllowList, BookResolver, EntitlementGate, GoogleBooksClient, LlmError,
    OpenLibraryClient, VerdictEngine, VerdictModel, VisionModel,
};
use safereads_api::AppState;
use safereads_common::config::{CacheStrategy, RetryConfig};
use safereads_common::db::init_in_memory_database;
use safereads_common::models::BookRecord;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const FREE_LIMIT: u32 = 3;
pub const ADMIN_EMAIL: &str = "admin@example.com";

// ============================================================================
// Model stubs
// ============================================================================

/// Verdict model that answers every call with a distinct summary
pub struct ScriptedModel {
    pub calls: AtomicUsize,
    verdict: String,
    delay: Duration,
    fail: bool,
}

impl ScriptedModel {
    pub fn new(verdict: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            verdict: verdict.to_string(),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    /// Hold each call open so concurrent requests overlap
    pub fn slow(verdict: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            verdict: verdict.to_string(),
            delay,
            fail: false,
        })
    }

    /// Upstream failure on every call
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            verdict: String::new(),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerdictModel for ScriptedModel {
    async fn complete_json(
        &self,
        _system_prompt: &str,
        _user_message: &str,
    ) -> Result<Option<String>, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(LlmError::ApiError(500, "model unavailable".to_string()));
        }

        Ok(Some(
            json!({
                "verdict": self.verdict,
                "ageRecommendation": "12+",
                "summary": format!("call {}", call),
                "contentFlags": [
                    {"category": "Violence", "severity": "mild", "details": "Schoolyard scuffles"}
                ],
                "reasoning": "Scripted",
            })
            .to_string(),
        ))
    }
}

/// Vision model with a fixed reading
pub struct FixedVision {
    pub reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FixedVision {
    pub fn new(reply: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VisionModel for FixedVision {
    async fn read_image_json(
        &self,
        _instruction: &str,
        image_data_url: &str,
    ) -> Result<Option<String>, LlmError> {
        assert!(image_data_url.starts_with("data:image/"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

// ============================================================================
// Upstream stub (Google Books under /books/v1, Open Library under /ol)
// ============================================================================

#[derive(Clone, Default)]
pub struct UpstreamState {
    pub google_calls: Arc<AtomicUsize>,
    /// 429 responses to send before answering normally
    pub rate_limited_responses: Arc<AtomicUsize>,
    pub open_library_calls: Arc<AtomicUsize>,
    pub open_library_search_calls: Arc<AtomicUsize>,
    /// Open Library routes ("isbn", "search", "works") answering 500
    pub failing_routes: Arc<Mutex<HashSet<&'static str>>>,
    pub volumes: Arc<Mutex<Vec<Value>>>,
    /// Query parameters of the latest Google Books request
    pub last_params: Arc<Mutex<HashMap<String, String>>>,
}

pub struct StubUpstream {
    pub addr: SocketAddr,
    pub state: UpstreamState,
}

impl StubUpstream {
    pub async fn start() -> Self {
        let state = UpstreamState::default();

        let app = Router::new()
            .route("/books/v1/volumes", get(volumes))
            .route("/ol/isbn/:file", get(edition))
            .route("/ol/search.json", get(ol_search))
            .route("/ol/works/:file", get(work))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn google_books_url(&self) -> String {
        format!("http://{}/books/v1", self.addr)
    }

    pub fn open_library_url(&self) -> String {
        format!("http://{}/ol", self.addr)
    }

    pub fn covers_url(&self) -> String {
        format!("http://{}/covers", self.addr)
    }

    pub fn set_volumes(&self, items: Vec<Value>) {
        *self.state.volumes.lock().unwrap() = items;
    }

    pub fn rate_limit_next(&self, responses: usize) {
        self.state
            .rate_limited_responses
            .store(responses, Ordering::SeqCst);
    }

    pub fn google_calls(&self) -> usize {
        self.state.google_calls.load(Ordering::SeqCst)
    }

    pub fn last_param(&self, name: &str) -> Option<String> {
        self.state.last_params.lock().unwrap().get(name).cloned()
    }

    pub fn open_library_calls(&self) -> usize {
        self.state.open_library_calls.load(Ordering::SeqCst)
    }

    pub fn open_library_search_calls(&self) -> usize {
        self.state.open_library_search_calls.load(Ordering::SeqCst)
    }

    /// Make one Open Library route answer 500
    pub fn fail_open_library(&self, route: &'static str) {
        self.state.failing_routes.lock().unwrap().insert(route);
    }
}

async fn volumes(
    State(state): State<UpstreamState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.google_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_params.lock().unwrap() = params;

    let limited = state
        .rate_limited_responses
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if limited {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "rate limited"})));
    }

    let items = state.volumes.lock().unwrap().clone();
    (
        StatusCode::OK,
        Json(json!({"totalItems": items.len(), "items": items})),
    )
}

/// Only the known ISBN resolves; everything else is a 404
async fn edition(
    State(state): State<UpstreamState>,
    Path(file): Path<String>,
) -> impl IntoResponse {
    state.open_library_calls.fetch_add(1, Ordering::SeqCst);

    if state.is_failing("isbn") {
        return server_error();
    }
    if file == format!("{}.json", KNOWN_ISBN) {
        (
            StatusCode::OK,
            Json(json!({"works": [{"key": "/works/OL2W"}], "covers": [-1, 42]})),
        )
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "notfound"})))
    }
}

async fn ol_search(State(state): State<UpstreamState>) -> (StatusCode, Json<Value>) {
    state.open_library_calls.fetch_add(1, Ordering::SeqCst);
    state.open_library_search_calls.fetch_add(1, Ordering::SeqCst);

    if state.is_failing("search") {
        return server_error();
    }
    (StatusCode::OK, Json(json!({
        "docs": [{
            "key": "/works/OL1W",
            "title": "Stub Work",
            "cover_i": 7,
            "subject": ["Adventure", "Friendship"]
        }]
    })))
}

async fn work(
    State(state): State<UpstreamState>,
    Path(file): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.open_library_calls.fetch_add(1, Ordering::SeqCst);

    if state.is_failing("works") {
        return server_error();
    }
    let key = file.trim_end_matches(".json");
    (
        StatusCode::OK,
        Json(json!({
            "description": {"type": "/type/text", "value": format!("Description of {}", key)},
            "subjects": ["Mystery"]
        })),
    )
}

impl UpstreamState {
    fn is_failing(&self, route: &str) -> bool {
        self.failing_routes.lock().unwrap().contains(route)
    }
}

fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal"})),
    )
}

/// ISBN the stub's edition endpoint knows
pub const KNOWN_ISBN: &str = "9780000000002";

/// Google Books volume item
pub fn volume(
    id: &str,
    title: &str,
    authors: &[&str],
    description: Option<&str>,
    categories: Option<&[&str]>,
) -> Value {
    let mut info = json!({
        "title": title,
        "authors": authors,
        "imageLinks": {"thumbnail": format!("http://books.google.com/{}.jpg", id)},
    });
    if let Some(description) = description {
        info["description"] = json!(description);
    }
    if let Some(categories) = categories {
        info["categories"] = json!(categories);
    }
    json!({"id": id, "volumeInfo": info})
}

/// Attach an ISBN-13 to a [`volume`]
pub fn with_isbn13(mut item: Value, isbn: &str) -> Value {
    item["volumeInfo"]["industryIdentifiers"] = json!([{"type": "ISBN_13", "identifier": isbn}]);
    item
}

// ============================================================================
// Application wiring
// ============================================================================

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_backoff_ms: 5,
    }
}

pub struct TestApp {
    pub db: SqlitePool,
    pub state: AppState,
    pub model: Arc<ScriptedModel>,
    pub upstream: StubUpstream,
}

impl TestApp {
    pub async fn new(strategy: CacheStrategy) -> Self {
        Self::with_model(ScriptedModel::new("safe"), strategy).await
    }

    pub async fn with_model(model: Arc<ScriptedModel>, strategy: CacheStrategy) -> Self {
        let db = init_in_memory_database().await.unwrap();
        let upstream = StubUpstream::start().await;

        let resolver = Arc::new(build_resolver(&db, &upstream, None));
        let engine = Arc::new(VerdictEngine::new(db.clone(), model.clone(), strategy));
        let entitlement = EntitlementGate::new(db.clone(), FREE_LIMIT);
        let admins = AdminAllowList::new([ADMIN_EMAIL]);

        let state = AppState::new(db.clone(), resolver, engine, entitlement, admins);

        Self {
            db,
            state,
            model,
            upstream,
        }
    }

    pub fn router(&self) -> axum::Router {
        safereads_api::build_router(self.state.clone())
    }

    /// Store a book directly, bypassing the resolver; no description means
    /// too little data to analyze
    pub async fn seed_book(&self, description: Option<&str>) -> Uuid {
        seed_book(&self.db, description).await
    }
}

pub fn build_resolver(
    db: &SqlitePool,
    upstream: &StubUpstream,
    vision: Option<Arc<dyn VisionModel>>,
) -> BookResolver {
    let google_books =
        GoogleBooksClient::new(upstream.google_books_url(), None, fast_retry()).unwrap();
    let open_library =
        OpenLibraryClient::new(upstream.open_library_url(), upstream.covers_url()).unwrap();
    BookResolver::new(db.clone(), google_books, open_library, vision, 10)
}

pub async fn seed_book(db: &SqlitePool, description: Option<&str>) -> Uuid {
    safereads_api::db::books::upsert_book(
        db,
        &BookRecord {
            google_books_id: Some(Uuid::new_v4().to_string()),
            title: "Holes".to_string(),
            authors: vec!["Louis Sachar".to_string()],
            description: description.map(str::to_string),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

// ============================================================================
// Router requests
// ============================================================================

/// Send one request through the router; an empty body reads as `Null`
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user_id: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Create the user row the auth proxy would have synced
pub async fn sync_user(app: &Router, user_id: &str, email: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/api/users/me",
        Some(user_id),
        Some(json!({"email": email, "name": user_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
