//! Google Books API client
//!
//! Volume search with rate-limit retry, plus normalization of volume items
//! into [`BookRecord`]s.

use safereads_common::config::RetryConfig;
use safereads_common::models::{BookRecord, UNKNOWN_AUTHOR};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::utils::{retry_on_rate_limit, RateLimitSignal};

pub const PROVIDER_NAME: &str = "Google Books";

/// Google Books rejects larger page sizes
const MAX_PAGE_SIZE: u32 = 40;

/// Google Books client errors
#[derive(Debug, Error)]
pub enum GoogleBooksError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl RateLimitSignal for GoogleBooksError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, GoogleBooksError::RateLimited)
    }

    fn status(&self) -> Option<u16> {
        match self {
            GoogleBooksError::RateLimited => Some(429),
            GoogleBooksError::ApiError(status, _) => Some(*status),
            GoogleBooksError::NetworkError(_) | GoogleBooksError::ParseError(_) => None,
        }
    }
}

impl From<GoogleBooksError> for safereads_common::Error {
    fn from(err: GoogleBooksError) -> Self {
        match err {
            GoogleBooksError::RateLimited => safereads_common::Error::UpstreamRateLimited {
                provider: PROVIDER_NAME.to_string(),
            },
            GoogleBooksError::ApiError(status, message) => safereads_common::Error::Upstream {
                provider: PROVIDER_NAME.to_string(),
                status,
                message,
            },
            // No HTTP status available; 0 marks "no response"
            GoogleBooksError::NetworkError(message) | GoogleBooksError::ParseError(message) => {
                safereads_common::Error::Upstream {
                    provider: PROVIDER_NAME.to_string(),
                    status: 0,
                    message,
                }
            }
        }
    }
}

/// `GET /volumes` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesResponse {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub items: Vec<VolumeItem>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeItem {
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub description: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub categories: Option<Vec<String>>,
    pub image_links: Option<ImageLinks>,
    pub industry_identifiers: Option<Vec<IndustryIdentifier>>,
    pub maturity_rating: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndustryIdentifier {
    /// `ISBN_10`, `ISBN_13`, `ISSN`, `OTHER`
    #[serde(rename = "type")]
    pub id_type: String,
    pub identifier: String,
}

/// Google Books API client
pub struct GoogleBooksClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl GoogleBooksClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        retry: RetryConfig,
    ) -> Result<Self, GoogleBooksError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GoogleBooksError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            retry,
        })
    }

    /// Free-text volume search, retried while rate limited
    pub async fn search_volumes(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<VolumeItem>, GoogleBooksError> {
        let max_results = max_results.clamp(1, MAX_PAGE_SIZE);

        let response = retry_on_rate_limit("google_books_search", self.retry, || {
            self.fetch_volumes(query, max_results)
        })
        .await?;

        tracing::debug!(
            query = %query,
            total_items = response.total_items,
            returned = response.items.len(),
            "Google Books search complete"
        );

        Ok(response.items)
    }

    /// Author-scoped search (`inauthor:"name"`)
    pub async fn search_by_author(
        &self,
        author: &str,
        max_results: u32,
    ) -> Result<Vec<VolumeItem>, GoogleBooksError> {
        let query = format!("inauthor:\"{}\"", author.replace('"', ""));
        self.search_volumes(&query, max_results).await
    }

    /// Single request, no retry
    async fn fetch_volumes(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<VolumesResponse, GoogleBooksError> {
        let url = format!("{}/volumes", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            ("maxResults", max_results.to_string()),
            ("printType", "books".to_string()),
            ("orderBy", "relevance".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        tracing::debug!(query = %query, max_results, "Querying Google Books API");

        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| GoogleBooksError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(GoogleBooksError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GoogleBooksError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| GoogleBooksError::ParseError(e.to_string()))
    }
}

/// Normalize a volume item into a book record
pub fn normalize_volume(item: &VolumeItem) -> BookRecord {
    let info = &item.volume_info;

    let authors = match &info.authors {
        Some(authors) if !authors.is_empty() => authors.clone(),
        _ => vec![UNKNOWN_AUTHOR.to_string()],
    };

    BookRecord {
        google_books_id: Some(item.id.clone()),
        open_library_key: None,
        title: info
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        authors,
        description: info.description.clone().filter(|d| !d.is_empty()),
        cover_url: select_cover(info.image_links.as_ref()),
        page_count: info.page_count,
        published_date: info.published_date.clone(),
        categories: info.categories.clone().filter(|c| !c.is_empty()),
        isbn10: find_identifier(info, "ISBN_10"),
        isbn13: find_identifier(info, "ISBN_13"),
        maturity_rating: info.maturity_rating.clone(),
        average_rating: info.average_rating,
        ratings_count: info.ratings_count,
    }
}

fn find_identifier(info: &VolumeInfo, id_type: &str) -> Option<String> {
    info.industry_identifiers
        .as_ref()?
        .iter()
        .find(|id| id.id_type == id_type)
        .map(|id| id.identifier.clone())
}

/// Larger thumbnail first, always served over https
fn select_cover(links: Option<&ImageLinks>) -> Option<String> {
    let links = links?;
    let url = links
        .thumbnail
        .as_deref()
        .or(links.small_thumbnail.as_deref())?;
    Some(force_https(url))
}

fn force_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}
