//! Domain models shared by SafeReads crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Author placeholder used when the provider lists no authors
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Lowest accepted value for a sensitivity dimension
pub const SENSITIVITY_MIN: i64 = 1;
/// Highest accepted value for a sensitivity dimension
pub const SENSITIVITY_MAX: i64 = 10;

// ============================================================================
// Books
// ============================================================================

/// Normalized bibliographic record, before it has a storage identifier
///
/// Produced by the metadata resolver and consumed by the book store upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Google Books volume id (upsert key)
    pub google_books_id: Option<String>,
    /// Open Library work key, e.g. `/works/OL45883W`
    pub open_library_key: Option<String>,
    pub title: String,
    /// Never empty; defaults to [`UNKNOWN_AUTHOR`]
    pub authors: Vec<String>,
    pub description: Option<String>,
    /// Always https when present
    pub cover_url: Option<String>,
    pub page_count: Option<i64>,
    pub published_date: Option<String>,
    pub categories: Option<Vec<String>>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub maturity_rating: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
}

impl BookRecord {
    /// True when neither a description nor any category is known
    pub fn is_sparse(&self) -> bool {
        is_sparse(&self.description, &self.categories)
    }

    /// Preferred ISBN for lookups (ISBN-13 first)
    pub fn preferred_isbn(&self) -> Option<&str> {
        self.isbn13.as_deref().or(self.isbn10.as_deref())
    }
}

/// Persisted book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub google_books_id: Option<String>,
    pub open_library_key: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub page_count: Option<i64>,
    pub published_date: Option<String>,
    pub categories: Option<Vec<String>>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub maturity_rating: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
}

impl Book {
    /// A book needs a description or at least one category to be analyzed
    pub fn has_sufficient_data(&self) -> bool {
        !is_sparse(&self.description, &self.categories)
    }
}

fn is_sparse(description: &Option<String>, categories: &Option<Vec<String>>) -> bool {
    let no_description = description.as_deref().map_or(true, str::is_empty);
    let no_categories = categories.as_ref().map_or(true, Vec::is_empty);
    no_description && no_categories
}

// ============================================================================
// Analyses
// ============================================================================

/// Content-safety verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Caution,
    Warning,
    NoVerdict,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::Safe,
        Verdict::Caution,
        Verdict::Warning,
        Verdict::NoVerdict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "safe",
            Verdict::Caution => "caution",
            Verdict::Warning => "warning",
            Verdict::NoVerdict => "no_verdict",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Verdict::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown verdict: {}", s)))
    }
}

/// Severity of one content category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Heavy,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::None,
        Severity::Mild,
        Severity::Moderate,
        Severity::Heavy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Heavy => "heavy",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Severity::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown severity: {}", s)))
    }
}

/// One content category finding, embedded in an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFlag {
    pub category: String,
    pub severity: Severity,
    pub details: String,
}

/// Analysis ready to be written to the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnalysis {
    pub book_id: Uuid,
    /// Cache key dimension; None in profile-independent mode
    pub profile_hash: Option<String>,
    pub verdict: Verdict,
    pub age_recommendation: Option<String>,
    pub summary: String,
    pub content_flags: Vec<ContentFlag>,
    pub reasoning: Option<String>,
}

/// Cached analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub book_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_hash: Option<String>,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_recommendation: Option<String>,
    pub summary: String,
    pub content_flags: Vec<ContentFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// Analysis joined with its book (recent analyses listing)
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisWithBook {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub book: Book,
}

// ============================================================================
// Sensitivity profiles
// ============================================================================

/// Reader tolerance vector, each dimension 1 (very low) to 10 (very high)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivitySettings {
    pub violence: i64,
    pub language: i64,
    pub sexual_content: i64,
    pub substance_use: i64,
    pub dark_themes: i64,
    pub religious_sensitivity: i64,
}

impl SensitivitySettings {
    /// Dimensions with their display names, in cache-key order
    pub fn dimensions(&self) -> [(&'static str, i64); 6] {
        [
            ("Violence", self.violence),
            ("Language", self.language),
            ("Sexual Content", self.sexual_content),
            ("Substance Use", self.substance_use),
            ("Dark Themes", self.dark_themes),
            ("Religious Sensitivity", self.religious_sensitivity),
        ]
    }

    /// Reject any dimension outside 1-10
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.dimensions() {
            if !(SENSITIVITY_MIN..=SENSITIVITY_MAX).contains(&value) {
                return Err(Error::InvalidInput(format!(
                    "{} must be between {} and {}, got {}",
                    name, SENSITIVITY_MIN, SENSITIVITY_MAX, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            violence: 5,
            language: 5,
            sexual_content: 5,
            substance_use: 5,
            dark_themes: 5,
            religious_sensitivity: 5,
        }
    }
}

/// Qualitative label for a tolerance value, used in model prompts
pub fn tolerance_label(value: i64) -> &'static str {
    match value {
        v if v <= 2 => "very low tolerance",
        v if v <= 4 => "low tolerance",
        v if v <= 6 => "moderate tolerance",
        v if v <= 8 => "high tolerance",
        _ => "very high tolerance",
    }
}

/// Saved sensitivity profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    #[serde(flatten)]
    pub settings: SensitivitySettings,
    pub is_default: bool,
    pub created_at: String,
}

// ============================================================================
// Users, entitlement, history
// ============================================================================

/// Billing subscription state mirrored from the payments provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Incomplete => "incomplete",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            other => Err(Error::InvalidInput(format!(
                "unknown subscription status: {}",
                other
            ))),
        }
    }
}

/// Application user, identity owned by the external auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// Lifetime count of fresh (model-computed) analyses
    pub analysis_count: i64,
    pub subscription_status: Option<SubscriptionStatus>,
    /// Unix seconds
    pub subscription_current_period_end: Option<i64>,
    pub created_at: String,
}

impl UserRecord {
    pub fn is_subscribed(&self) -> bool {
        self.subscription_status == Some(SubscriptionStatus::Active)
    }
}

/// Result of an entitlement check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStatus {
    pub has_access: bool,
    pub free_remaining: u32,
    pub is_subscribed: bool,
}

impl AccessStatus {
    /// No access at all (unknown or anonymous user)
    pub fn denied() -> Self {
        Self {
            has_access: false,
            free_remaining: 0,
            is_subscribed: false,
        }
    }
}

/// Recorded search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub query: String,
    pub result_count: i64,
    pub created_at: String,
}
