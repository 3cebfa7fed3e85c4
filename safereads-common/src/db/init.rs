//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up to
//! date. Every statement is idempotent, so this runs on each startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (or create) the database file and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets search fan-out read while an analysis is being written
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// One connection only: every `sqlite::memory:` connection is its own database.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_users_table(pool).await?;
    create_settings_table(pool).await?;
    create_books_table(pool).await?;
    create_analyses_table(pool).await?;
    create_profiles_table(pool).await?;
    create_search_history_table(pool).await?;

    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT,
            analysis_count INTEGER NOT NULL DEFAULT 0,
            subscription_status TEXT,
            subscription_current_period_end INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Key-value store; holds API keys configured at runtime.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the books table
///
/// `authors` and `categories` are JSON arrays. `google_books_id` is the
/// upsert key; SQLite UNIQUE allows any number of NULLs.
pub async fn create_books_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            google_books_id TEXT UNIQUE,
            open_library_key TEXT,
            title TEXT NOT NULL,
            authors TEXT NOT NULL,
            description TEXT,
            cover_url TEXT,
            page_count INTEGER,
            published_date TEXT,
            categories TEXT,
            isbn10 TEXT,
            isbn13 TEXT,
            maturity_rating TEXT,
            average_rating REAL,
            ratings_count INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_isbn13 ON books(isbn13)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the analyses table (the verdict cache)
///
/// `(book_id, profile_hash)` is deliberately not UNIQUE: concurrent writers in
/// different processes may both insert, and readers take the newest row.
pub async fn create_analyses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            profile_hash TEXT,
            verdict TEXT NOT NULL CHECK (verdict IN ('safe', 'caution', 'warning', 'no_verdict')),
            age_recommendation TEXT,
            summary TEXT NOT NULL,
            content_flags TEXT NOT NULL DEFAULT '[]',
            reasoning TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analyses_book_profile ON analyses(book_id, profile_hash)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            violence INTEGER NOT NULL,
            language INTEGER NOT NULL,
            sexual_content INTEGER NOT NULL,
            substance_use INTEGER NOT NULL,
            dark_themes INTEGER NOT NULL,
            religious_sensitivity INTEGER NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_profiles_user ON profiles(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_search_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_history (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            query TEXT NOT NULL,
            result_count INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_history_user ON search_history(user_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
