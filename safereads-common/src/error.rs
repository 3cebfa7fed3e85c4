//! Common error types for SafeReads

use thiserror::Error;

/// Common result type for SafeReads operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SafeReads crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller is authenticated but not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bibliographic provider kept answering 429 after all retries
    #[error("{provider} is rate limiting requests. Please try again in a moment.")]
    UpstreamRateLimited { provider: String },

    /// Bibliographic provider answered with a non-success status
    #[error("{provider} error {status}: {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
    },

    /// Language model returned no content
    #[error("Language model returned an empty response")]
    ModelEmptyResponse,

    /// Language model returned content that is not valid JSON
    #[error("Language model returned unparsable output: {0}")]
    ModelParse(String),

    /// Free analysis quota used up and no active subscription
    #[error("Free analysis limit reached; a subscription is required")]
    QuotaExceeded {
        free_remaining: u32,
        is_subscribed: bool,
    },

    /// Vision model could not extract a title from a cover photo
    #[error("Could not identify a book from this photo. Try a clearer picture of the front cover.")]
    CoverNotIdentified,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON serialization failed: {}", err))
    }
}
