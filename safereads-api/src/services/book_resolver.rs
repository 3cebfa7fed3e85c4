//! Book metadata resolver
//!
//! Turns a free-text query into persisted [`Book`]s:
//! 1. Google Books search (rate-limit retry inside the client)
//! 2. Normalize every volume
//! 3. Enrich sparse volumes from Open Library (best-effort)
//! 4. Upsert into the book store
//!
//! Volumes are resolved concurrently; enrichment for a single volume stays
//! sequential. Results keep the provider's relevance order.

use base64::Engine;
use futures::future::join_all;
use safereads_common::models::{Book, BookRecord};
use safereads_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::db::books;
use crate::services::google_books_client::{normalize_volume, GoogleBooksClient, VolumeItem};
use crate::services::llm_client::VisionModel;
use crate::services::open_library_client::{Enrichment, OpenLibraryClient};
use crate::services::prompts::COVER_IDENTIFICATION_PROMPT;

/// Decoded cover photos above this size are rejected
pub const MAX_COVER_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifiedCover {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl IdentifiedCover {
    /// Search query built from the identified title and author
    pub fn query(&self) -> String {
        match &self.author {
            Some(author) => format!("{} {}", self.title, author),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverSearch {
    pub identified: IdentifiedCover,
    pub books: Vec<Book>,
}

pub struct BookResolver {
    db: SqlitePool,
    google_books: GoogleBooksClient,
    open_library: OpenLibraryClient,
    vision: Option<Arc<dyn VisionModel>>,
    default_max_results: u32,
}

impl BookResolver {
    pub fn new(
        db: SqlitePool,
        google_books: GoogleBooksClient,
        open_library: OpenLibraryClient,
        vision: Option<Arc<dyn VisionModel>>,
        default_max_results: u32,
    ) -> Self {
        Self {
            db,
            google_books,
            open_library,
            vision,
            default_max_results,
        }
    }

    /// Free-text search (title, author or ISBN)
    pub async fn search(&self, query: &str, max_results: Option<u32>) -> Result<Vec<Book>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Search query must not be empty".to_string()));
        }

        let limit = max_results.unwrap_or(self.default_max_results);
        let items = self.google_books.search_volumes(query, limit).await?;

        tracing::info!(query = %query, results = items.len(), "Book search");
        self.resolve_items(items).await
    }

    /// Search restricted to one author's catalog
    pub async fn search_by_author(&self, author: &str, max_results: Option<u32>) -> Result<Vec<Book>> {
        let author = author.trim();
        if author.is_empty() {
            return Err(Error::InvalidInput("Author name must not be empty".to_string()));
        }

        let limit = max_results.unwrap_or(self.default_max_results);
        let items = self.google_books.search_by_author(author, limit).await?;

        tracing::info!(author = %author, results = items.len(), "Author catalog search");
        self.resolve_items(items).await
    }

    /// Identify a book from a cover photo, then search for it
    pub async fn identify_cover(
        &self,
        image_base64: &str,
        mime_type: &str,
        max_results: Option<u32>,
    ) -> Result<CoverSearch> {
        let vision = self
            .vision
            .as_ref()
            .ok_or_else(|| Error::Config("Vision model is not configured".to_string()))?;

        if !mime_type.starts_with("image/") {
            return Err(Error::InvalidInput(format!(
                "Unsupported image type: {}",
                mime_type
            )));
        }

        let image_bytes = base64::engine::general_purpose::STANDARD
            .decode(image_base64.trim())
            .map_err(|e| Error::InvalidInput(format!("Image is not valid base64: {}", e)))?;
        if image_bytes.is_empty() {
            return Err(Error::InvalidInput("Image is empty".to_string()));
        }
        if image_bytes.len() > MAX_COVER_IMAGE_BYTES {
            return Err(Error::InvalidInput(format!(
                "Image is larger than {} bytes",
                MAX_COVER_IMAGE_BYTES
            )));
        }

        let data_url = format!("data:{};base64,{}", mime_type, image_base64.trim());
        let raw = vision
            .read_image_json(COVER_IDENTIFICATION_PROMPT, &data_url)
            .await?;

        let identified = parse_cover_reading(raw.as_deref()).ok_or(Error::CoverNotIdentified)?;

        tracing::info!(
            title = %identified.title,
            author = identified.author.as_deref().unwrap_or(""),
            "Identified book from cover photo"
        );

        let books = self.search(&identified.query(), max_results).await?;
        Ok(CoverSearch { identified, books })
    }

    async fn resolve_items(&self, items: Vec<VolumeItem>) -> Result<Vec<Book>> {
        let resolved = join_all(items.iter().map(|item| self.resolve_item(item))).await;
        resolved.into_iter().collect()
    }

    async fn resolve_item(&self, item: &VolumeItem) -> Result<Book> {
        let mut record = normalize_volume(item);

        if record.is_sparse() {
            let author = record.authors.first().cloned();
            let enrichment = self
                .open_library
                .enrich(record.preferred_isbn(), &record.title, author.as_deref())
                .await;
            if !enrichment.is_empty() {
                tracing::debug!(
                    google_books_id = %item.id,
                    work_key = enrichment.work_key.as_deref().unwrap_or(""),
                    "Enriched sparse volume from Open Library"
                );
            }
            apply_enrichment(&mut record, enrichment);
        }

        let id = books::upsert_book(&self.db, &record).await?;
        books::load_book(&self.db, id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Book {} missing after upsert", id)))
    }
}

/// Fill only fields the primary provider left empty
pub fn apply_enrichment(record: &mut BookRecord, enrichment: Enrichment) {
    if record.open_library_key.is_none() {
        record.open_library_key = enrichment.work_key;
    }
    if record.description.as_deref().map_or(true, str::is_empty) {
        if let Some(description) = enrichment.description {
            record.description = Some(description);
        }
    }
    if record.categories.as_ref().map_or(true, Vec::is_empty) {
        if let Some(subjects) = enrichment.subjects {
            record.categories = Some(subjects);
        }
    }
    if record.cover_url.is_none() {
        record.cover_url = enrichment.cover_url;
    }
}

/// `{"title", "author"}` from the vision model; `None` without a usable title
fn parse_cover_reading(raw: Option<&str>) -> Option<IdentifiedCover> {
    let raw = raw.filter(|r| !r.is_empty())?;

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Cover identification returned unparsable output");
            return None;
        }
    };

    let text = |key: &str| {
        parsed
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(IdentifiedCover {
        title: text("title")?,
        author: text("author"),
    })
}
