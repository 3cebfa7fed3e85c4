//! Settings database operations
//!
//! Key-value accessors for the `settings` table. API keys entered at
//! runtime are stored here and take priority over environment and TOML.

use safereads_common::{Error, Result};
use sqlx::{Pool, Sqlite};

pub const OPENAI_API_KEY: &str = "openai_api_key";
pub const GOOGLE_BOOKS_API_KEY: &str = "google_books_api_key";

pub async fn get_openai_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, OPENAI_API_KEY).await
}

pub async fn set_openai_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, OPENAI_API_KEY, key).await
}

pub async fn get_google_books_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GOOGLE_BOOKS_API_KEY).await
}

pub async fn set_google_books_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, GOOGLE_BOOKS_API_KEY, key).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
