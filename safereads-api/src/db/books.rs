//! Book database operations
//!
//! Books are keyed by `google_books_id`. Re-importing a volume merges the
//! incoming record over the stored one: incoming values win when present,
//! missing incoming values never erase stored ones.

use safereads_common::models::{Book, BookRecord};
use safereads_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_uuid};

const BOOK_COLUMNS: &str = r#"
    id, google_books_id, open_library_key, title, authors, description,
    cover_url, page_count, published_date, categories, isbn10, isbn13,
    maturity_rating, average_rating, ratings_count
"#;

/// Insert or merge a book, returning its identifier
///
/// Single statement, so concurrent upserts of the same volume converge on
/// one row.
pub async fn upsert_book(pool: &SqlitePool, record: &BookRecord) -> Result<Uuid> {
    let authors = serde_json::to_string(&record.authors)?;
    let categories = record
        .categories
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = now_timestamp();

    let (id,): (String,) = sqlx::query_as(
        r#"
        INSERT INTO books (
            id, google_books_id, open_library_key, title, authors, description,
            cover_url, page_count, published_date, categories, isbn10, isbn13,
            maturity_rating, average_rating, ratings_count, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(google_books_id) DO UPDATE SET
            title = excluded.title,
            authors = excluded.authors,
            open_library_key = COALESCE(excluded.open_library_key, books.open_library_key),
            description = COALESCE(excluded.description, books.description),
            cover_url = COALESCE(excluded.cover_url, books.cover_url),
            page_count = COALESCE(excluded.page_count, books.page_count),
            published_date = COALESCE(excluded.published_date, books.published_date),
            categories = COALESCE(excluded.categories, books.categories),
            isbn10 = COALESCE(excluded.isbn10, books.isbn10),
            isbn13 = COALESCE(excluded.isbn13, books.isbn13),
            maturity_rating = COALESCE(excluded.maturity_rating, books.maturity_rating),
            average_rating = COALESCE(excluded.average_rating, books.average_rating),
            ratings_count = COALESCE(excluded.ratings_count, books.ratings_count),
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&record.google_books_id)
    .bind(&record.open_library_key)
    .bind(&record.title)
    .bind(authors)
    .bind(&record.description)
    .bind(&record.cover_url)
    .bind(record.page_count)
    .bind(&record.published_date)
    .bind(categories)
    .bind(&record.isbn10)
    .bind(&record.isbn13)
    .bind(&record.maturity_rating)
    .bind(record.average_rating)
    .bind(record.ratings_count)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    parse_uuid(&id)
}

/// Load a book by identifier
pub async fn load_book(pool: &SqlitePool, id: Uuid) -> Result<Option<Book>> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(book_from_row).transpose()
}


pub async fn count_books(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Map a row selected with [`BOOK_COLUMNS`] (optionally prefixed `book_`)
pub(crate) fn book_from_row(row: &SqliteRow) -> Result<Book> {
    book_from_prefixed_row(row, "")
}

pub(crate) fn book_from_prefixed_row(row: &SqliteRow, prefix: &str) -> Result<Book> {
    let col = |name: &str| format!("{}{}", prefix, name);

    let id: String = row.try_get(col("id").as_str())?;
    let authors: String = row.try_get(col("authors").as_str())?;
    let categories: Option<String> = row.try_get(col("categories").as_str())?;

    Ok(Book {
        id: parse_uuid(&id)?,
        google_books_id: row.try_get(col("google_books_id").as_str())?,
        open_library_key: row.try_get(col("open_library_key").as_str())?,
        title: row.try_get(col("title").as_str())?,
        authors: serde_json::from_str(&authors)?,
        description: row.try_get(col("description").as_str())?,
        cover_url: row.try_get(col("cover_url").as_str())?,
        page_count: row.try_get(col("page_count").as_str())?,
        published_date: row.try_get(col("published_date").as_str())?,
        categories: categories.as_deref().map(serde_json::from_str).transpose()?,
        isbn10: row.try_get(col("isbn10").as_str())?,
        isbn13: row.try_get(col("isbn13").as_str())?,
        maturity_rating: row.try_get(col("maturity_rating").as_str())?,
        average_rating: row.try_get(col("average_rating").as_str())?,
        ratings_count: row.try_get(col("ratings_count").as_str())?,
    })
}
