//! Open Library client
//!
//! Secondary bibliographic source used to fill in descriptions, subjects and
//! covers for sparse Google Books records. Enrichment is best-effort: every
//! failure is logged and the caller keeps whatever was gathered so far.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Open Library returns many loosely curated subjects; keep the first few
const MAX_SUBJECTS: usize = 5;

#[derive(Debug, Error)]
pub enum OpenLibraryError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}")]
    ApiError(u16),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// `GET /isbn/{isbn}.json` (edition record)
#[derive(Debug, Clone, Deserialize)]
pub struct EditionRecord {
    #[serde(default)]
    pub works: Vec<KeyRef>,
    #[serde(default)]
    pub covers: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyRef {
    pub key: String,
}

/// `GET /search.json`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub docs: Vec<SearchDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchDoc {
    pub key: Option<String>,
    pub cover_i: Option<i64>,
    pub subject: Option<Vec<String>>,
}

/// `GET /works/{id}.json`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkRecord {
    pub description: Option<TextValue>,
    pub subjects: Option<Vec<String>>,
}

/// Work descriptions are either a bare string or `{ "type": ..., "value": ... }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    Plain(String),
    Typed { value: String },
}

impl TextValue {
    pub fn into_text(self) -> String {
        match self {
            TextValue::Plain(text) => text,
            TextValue::Typed { value } => value,
        }
    }
}

/// Fields Open Library could supply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub work_key: Option<String>,
    pub description: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub cover_url: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.work_key.is_none()
            && self.description.is_none()
            && self.subjects.is_none()
            && self.cover_url.is_none()
    }
}

/// Open Library API client
pub struct OpenLibraryClient {
    http_client: reqwest::Client,
    base_url: String,
    covers_url: String,
}

impl OpenLibraryClient {
    pub fn new(
        base_url: impl Into<String>,
        covers_url: impl Into<String>,
    ) -> Result<Self, OpenLibraryError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| OpenLibraryError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            covers_url: covers_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Gather whatever Open Library knows about a book
    ///
    /// 1. ISBN lookup for the work key and an edition cover
    /// 2. Otherwise a title + author search for key, subjects and cover
    /// 3. Work record for the description (and subjects, if still missing)
    ///
    /// Never fails. A failed ISBN lookup falls through to the search; later
    /// errors end the lookup. All of them are logged at warn.
    pub async fn enrich(&self, isbn: Option<&str>, title: &str, author: Option<&str>) -> Enrichment {
        let mut enrichment = Enrichment::default();

        if let Some(isbn) = isbn {
            match self.lookup_isbn(isbn).await {
                Ok(Some(edition)) => {
                    enrichment.work_key = edition.works.first().map(|w| w.key.clone());
                    enrichment.cover_url = edition
                        .covers
                        .iter()
                        .find(|id| **id > 0)
                        .map(|id| self.cover_url(*id));
                }
                Ok(None) => {
                    tracing::debug!(isbn = %isbn, "ISBN unknown to Open Library");
                }
                Err(e) => {
                    tracing::warn!(
                        isbn = %isbn,
                        error = %e,
                        "Open Library ISBN lookup failed, trying search"
                    );
                }
            }
        }

        if enrichment.work_key.is_none() {
            match self.search(title, author).await {
                Ok(Some(doc)) => {
                    enrichment.work_key = doc.key;
                    enrichment.subjects = doc
                        .subject
                        .map(|s| s.into_iter().take(MAX_SUBJECTS).collect::<Vec<_>>())
                        .filter(|s| !s.is_empty());
                    if enrichment.cover_url.is_none() {
                        enrichment.cover_url =
                            doc.cover_i.filter(|id| *id > 0).map(|id| self.cover_url(id));
                    }
                }
                Ok(None) => {
                    tracing::debug!(title = %title, "No Open Library search match");
                }
                Err(e) => {
                    tracing::warn!(title = %title, error = %e, "Open Library search failed");
                    return enrichment;
                }
            }
        }

        let Some(work_key) = enrichment.work_key.clone() else {
            return enrichment;
        };

        match self.fetch_work(&work_key).await {
            Ok(work) => {
                enrichment.description = work
                    .description
                    .map(TextValue::into_text)
                    .filter(|d| !d.trim().is_empty());
                if enrichment.subjects.is_none() {
                    enrichment.subjects = work
                        .subjects
                        .map(|s| s.into_iter().take(MAX_SUBJECTS).collect::<Vec<_>>())
                        .filter(|s| !s.is_empty());
                }
            }
            Err(e) => {
                tracing::warn!(work_key = %work_key, error = %e, "Open Library work fetch failed");
            }
        }

        enrichment
    }

    /// Edition by ISBN; `None` when Open Library has no such edition
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<Option<EditionRecord>, OpenLibraryError> {
        let url = format!("{}/isbn/{}.json", self.base_url, isbn);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| OpenLibraryError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(OpenLibraryError::ApiError(status.as_u16()));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| OpenLibraryError::ParseError(e.to_string()))
    }

    /// Best title + author match
    pub async fn search(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<SearchDoc>, OpenLibraryError> {
        let url = format!("{}/search.json", self.base_url);
        let query = match author {
            Some(author) => format!("{} {}", title, author),
            None => title.to_string(),
        };

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("limit", "1"),
                ("fields", "key,title,cover_i,subject"),
            ])
            .send()
            .await
            .map_err(|e| OpenLibraryError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OpenLibraryError::ApiError(status.as_u16()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| OpenLibraryError::ParseError(e.to_string()))?;

        Ok(body.docs.into_iter().next())
    }

    /// Work record; `work_key` is the full key, e.g. `/works/OL45883W`
    pub async fn fetch_work(&self, work_key: &str) -> Result<WorkRecord, OpenLibraryError> {
        let url = format!("{}{}.json", self.base_url, work_key);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| OpenLibraryError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OpenLibraryError::ApiError(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| OpenLibraryError::ParseError(e.to_string()))
    }

    /// Medium-size cover image URL
    pub fn cover_url(&self, cover_id: i64) -> String {
        format!("{}/b/id/{}-M.jpg", self.covers_url, cover_id)
    }
}
