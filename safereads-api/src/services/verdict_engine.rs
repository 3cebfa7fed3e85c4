//! Verdict engine
//!
//! Produces the content-safety analysis for a book:
//!
//! ```text
//! fetch book -> resolve cache key -> check cache --hit--> cached analysis
//!                                          |
//!                                        miss
//!                                          |
//!                   insufficient data? --yes--> store no_verdict
//!                                          |
//!                          invoke model -> validate -> persist
//! ```
//!
//! Failures (unknown book, model error, unparsable output) end the pipeline
//! before anything is written.
//!
//! Concurrent misses for the same cache key inside one process are
//! collapsed: the first caller computes while the others wait on a per-key
//! lock and then read the freshly cached row. Separate processes can still
//! race and insert duplicates; lookups take the newest row.
//!
//! The engine does not know about quota. Callers check entitlement first and
//! charge the user only when [`VerdictOutcome::is_fresh`] is true.

use safereads_common::config::CacheStrategy;
use safereads_common::models::{Analysis, Book, NewAnalysis, SensitivitySettings, Verdict};
use safereads_common::{compute_profile_hash, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{analyses, books};
use crate::services::llm_client::VerdictModel;
use crate::services::prompts::{
    build_user_message, objective_system_prompt, personalized_system_prompt,
};
use crate::services::verdict_parser::parse_model_verdict;

pub const INSUFFICIENT_DATA_SUMMARY: &str = "Insufficient book data available for content \
analysis. Try searching for this book again or check back later.";

/// Where an analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// Served from the analysis cache
    Cache,
    /// Synthesized `no_verdict` for a book without description or categories
    InsufficientData,
    /// Freshly computed by the model
    Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerdictOutcome {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub source: VerdictSource,
}

impl VerdictOutcome {
    /// True when a model call was made (the only case that consumes quota)
    pub fn is_fresh(&self) -> bool {
        self.source == VerdictSource::Model
    }
}

type CacheKey = (Uuid, Option<String>);

/// How a computed analysis is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Replace,
}

pub struct VerdictEngine {
    db: SqlitePool,
    model: Arc<dyn VerdictModel>,
    strategy: CacheStrategy,
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl VerdictEngine {
    pub fn new(db: SqlitePool, model: Arc<dyn VerdictModel>, strategy: CacheStrategy) -> Self {
        Self {
            db,
            model,
            strategy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Cache lookup only; never calls the model
    pub async fn peek(
        &self,
        book_id: Uuid,
        profile: Option<&SensitivitySettings>,
    ) -> Result<Option<Analysis>> {
        let profile_hash = self.resolve_cache_key(profile)?;
        analyses::load_cached(&self.db, book_id, profile_hash.as_deref()).await
    }

    /// Cached analysis if present, otherwise compute and store one
    pub async fn analyze(
        &self,
        book_id: Uuid,
        profile: Option<&SensitivitySettings>,
    ) -> Result<VerdictOutcome> {
        let book = self.fetch_book(book_id).await?;
        let profile_hash = self.resolve_cache_key(profile)?;

        if let Some(cached) = self.check_cache(book_id, profile_hash.as_deref()).await? {
            return Ok(cached);
        }

        let key: CacheKey = (book_id, profile_hash.clone());
        let key_lock = self.acquire_key_lock(&key).await;

        let result = {
            let _guard = key_lock.lock().await;

            // Another caller may have finished while we waited
            let rechecked = self.check_cache(book_id, profile_hash.as_deref()).await;
            match rechecked {
                Ok(Some(cached)) => Ok(cached),
                Ok(None) => {
                    self.compute(&book, profile_hash, profile, WriteMode::Insert)
                        .await
                }
                Err(e) => Err(e),
            }
        };

        self.release_key_lock(&key, key_lock).await;
        result
    }

    /// Discard any cached analysis for the key and compute a fresh one
    ///
    /// The old row is swapped for the new one only after the model call
    /// succeeds, so a failed re-analysis keeps the previous verdict.
    pub async fn reanalyze(
        &self,
        book_id: Uuid,
        profile: Option<&SensitivitySettings>,
    ) -> Result<VerdictOutcome> {
        let book = self.fetch_book(book_id).await?;
        let profile_hash = self.resolve_cache_key(profile)?;

        let key: CacheKey = (book_id, profile_hash.clone());
        let key_lock = self.acquire_key_lock(&key).await;

        let result = {
            let _guard = key_lock.lock().await;
            self.compute(&book, profile_hash, profile, WriteMode::Replace)
                .await
        };

        self.release_key_lock(&key, key_lock).await;
        result
    }

    async fn fetch_book(&self, book_id: Uuid) -> Result<Book> {
        tracing::debug!(book_id = %book_id, "Fetching book");
        books::load_book(&self.db, book_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Book {}", book_id)))
    }

    /// `None` in profile-independent mode; the profile hash otherwise
    fn resolve_cache_key(&self, profile: Option<&SensitivitySettings>) -> Result<Option<String>> {
        match self.strategy {
            CacheStrategy::ProfileIndependent => Ok(None),
            CacheStrategy::ProfileKeyed => {
                let settings = profile.ok_or_else(|| {
                    Error::NotFound("Sensitivity profile required for analysis".to_string())
                })?;
                settings.validate()?;
                Ok(Some(compute_profile_hash(settings)))
            }
        }
    }

    async fn check_cache(
        &self,
        book_id: Uuid,
        profile_hash: Option<&str>,
    ) -> Result<Option<VerdictOutcome>> {
        let cached = analyses::load_cached(&self.db, book_id, profile_hash).await?;

        Ok(cached.map(|analysis| {
            tracing::debug!(book_id = %book_id, analysis_id = %analysis.id, "Analysis cache hit");
            VerdictOutcome {
                analysis,
                source: VerdictSource::Cache,
            }
        }))
    }

    async fn compute(
        &self,
        book: &Book,
        profile_hash: Option<String>,
        profile: Option<&SensitivitySettings>,
        mode: WriteMode,
    ) -> Result<VerdictOutcome> {
        if !book.has_sufficient_data() {
            tracing::info!(
                book_id = %book.id,
                title = %book.title,
                "Insufficient book data, storing no_verdict"
            );

            let record = NewAnalysis {
                book_id: book.id,
                profile_hash,
                verdict: Verdict::NoVerdict,
                age_recommendation: None,
                summary: INSUFFICIENT_DATA_SUMMARY.to_string(),
                content_flags: Vec::new(),
                reasoning: None,
            };

            return Ok(VerdictOutcome {
                analysis: self.persist(&record, mode).await?,
                source: VerdictSource::InsufficientData,
            });
        }

        let (system_prompt, user_message) = match self.strategy {
            CacheStrategy::ProfileIndependent => {
                (objective_system_prompt(), build_user_message(book, None))
            }
            CacheStrategy::ProfileKeyed => {
                (personalized_system_prompt(), build_user_message(book, profile))
            }
        };

        tracing::info!(book_id = %book.id, title = %book.title, "Invoking model for verdict");

        let raw = self
            .model
            .complete_json(&system_prompt, &user_message)
            .await
            .map_err(|e| {
                tracing::error!(book_id = %book.id, error = %e, "Model call failed");
                Error::from(e)
            })?;

        let parsed = parse_model_verdict(raw.as_deref()).map_err(|e| {
            tracing::error!(book_id = %book.id, error = %e, "Model response rejected");
            e
        })?;

        let record = NewAnalysis {
            book_id: book.id,
            profile_hash,
            verdict: parsed.verdict,
            age_recommendation: parsed.age_recommendation,
            summary: parsed.summary,
            content_flags: parsed.content_flags,
            reasoning: parsed.reasoning,
        };

        let analysis = self.persist(&record, mode).await?;

        tracing::info!(
            book_id = %book.id,
            verdict = %analysis.verdict,
            "Verdict stored"
        );

        Ok(VerdictOutcome {
            analysis,
            source: VerdictSource::Model,
        })
    }

    async fn persist(&self, record: &NewAnalysis, mode: WriteMode) -> Result<Analysis> {
        match mode {
            WriteMode::Insert => analyses::insert_analysis(&self.db, record).await,
            WriteMode::Replace => analyses::replace_analysis(&self.db, record).await,
        }
    }

    async fn acquire_key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other caller holds the key lock
    async fn release_key_lock(&self, key: &CacheKey, key_lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // One reference in the map, one held here
        if Arc::strong_count(&key_lock) <= 2 {
            in_flight.remove(key);
        }
    }

    #[cfg(test)]
    async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}
