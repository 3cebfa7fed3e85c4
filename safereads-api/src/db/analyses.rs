//! Analysis database operations (the verdict cache)
//!
//! Lookups match `profile_hash` with `IS`, so a NULL hash (profile-independent
//! mode) matches only NULL rows. When duplicates exist the newest row wins.

use safereads_common::models::{Analysis, AnalysisWithBook, ContentFlag, NewAnalysis, Verdict};
use safereads_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::books::book_from_prefixed_row;
use super::{now_timestamp, parse_uuid};

const ANALYSIS_COLUMNS: &str = r#"
    id, book_id, profile_hash, verdict, age_recommendation, summary,
    content_flags, reasoning, created_at
"#;

/// Newest cached analysis for (book, profile hash)
pub async fn load_cached(
    pool: &SqlitePool,
    book_id: Uuid,
    profile_hash: Option<&str>,
) -> Result<Option<Analysis>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM analyses
        WHERE book_id = ? AND profile_hash IS ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
        ANALYSIS_COLUMNS
    ))
    .bind(book_id.to_string())
    .bind(profile_hash)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(analysis_from_row).transpose()
}

/// Persist a new analysis row
pub async fn insert_analysis(pool: &SqlitePool, analysis: &NewAnalysis) -> Result<Analysis> {
    let mut conn = pool.acquire().await?;
    insert_with(&mut conn, analysis).await
}

/// Swap the cached analysis for a key in one transaction
///
/// Any earlier rows for the key are removed and the new one inserted; a
/// failure leaves the previous rows untouched.
pub async fn replace_analysis(pool: &SqlitePool, analysis: &NewAnalysis) -> Result<Analysis> {
    let mut tx = pool.begin().await?;

    let removed = delete_with(&mut tx, analysis.book_id, analysis.profile_hash.as_deref()).await?;
    let stored = insert_with(&mut tx, analysis).await?;

    tx.commit().await?;

    tracing::debug!(
        book_id = %analysis.book_id,
        removed,
        "Replaced cached analysis"
    );

    Ok(stored)
}

/// Most recent analyses across all books, joined with the book
pub async fn list_recent(pool: &SqlitePool, count: u32) -> Result<Vec<AnalysisWithBook>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.book_id, a.profile_hash, a.verdict, a.age_recommendation,
               a.summary, a.content_flags, a.reasoning, a.created_at,
               b.google_books_id AS book_google_books_id,
               b.open_library_key AS book_open_library_key, b.title AS book_title,
               b.authors AS book_authors, b.description AS book_description,
               b.cover_url AS book_cover_url, b.page_count AS book_page_count,
               b.published_date AS book_published_date, b.categories AS book_categories,
               b.isbn10 AS book_isbn10, b.isbn13 AS book_isbn13,
               b.maturity_rating AS book_maturity_rating,
               b.average_rating AS book_average_rating,
               b.ratings_count AS book_ratings_count
        FROM analyses a
        JOIN books b ON b.id = a.book_id
        ORDER BY a.created_at DESC, a.rowid DESC
        LIMIT ?
        "#,
    )
    .bind(i64::from(count))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(AnalysisWithBook {
                analysis: analysis_from_row(row)?,
                book: book_from_prefixed_row(row, "book_")?,
            })
        })
        .collect()
}

/// Per-verdict row counts (admin statistics)
pub async fn count_by_verdict(pool: &SqlitePool) -> Result<Vec<(Verdict, i64)>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT verdict, COUNT(*) FROM analyses GROUP BY verdict")
            .fetch_all(pool)
            .await?;

    let mut counts: Vec<(Verdict, i64)> = Verdict::ALL.iter().map(|v| (*v, 0)).collect();
    for (verdict, count) in rows {
        let verdict: Verdict = verdict.parse()?;
        if let Some(entry) = counts.iter_mut().find(|(v, _)| *v == verdict) {
            entry.1 = count;
        }
    }
    Ok(counts)
}

async fn insert_with(conn: &mut SqliteConnection, analysis: &NewAnalysis) -> Result<Analysis> {
    let id = Uuid::new_v4();
    let created_at = now_timestamp();
    let content_flags = serde_json::to_string(&analysis.content_flags)?;

    sqlx::query(
        r#"
        INSERT INTO analyses (
            id, book_id, profile_hash, verdict, age_recommendation, summary,
            content_flags, reasoning, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(analysis.book_id.to_string())
    .bind(&analysis.profile_hash)
    .bind(analysis.verdict.as_str())
    .bind(&analysis.age_recommendation)
    .bind(&analysis.summary)
    .bind(content_flags)
    .bind(&analysis.reasoning)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?;

    Ok(Analysis {
        id,
        book_id: analysis.book_id,
        profile_hash: analysis.profile_hash.clone(),
        verdict: analysis.verdict,
        age_recommendation: analysis.age_recommendation.clone(),
        summary: analysis.summary.clone(),
        content_flags: analysis.content_flags.clone(),
        reasoning: analysis.reasoning.clone(),
        created_at,
    })
}

async fn delete_with(
    conn: &mut SqliteConnection,
    book_id: Uuid,
    profile_hash: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM analyses WHERE book_id = ? AND profile_hash IS ?")
        .bind(book_id.to_string())
        .bind(profile_hash)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

fn analysis_from_row(row: &SqliteRow) -> Result<Analysis> {
    let id: String = row.try_get("id")?;
    let book_id: String = row.try_get("book_id")?;
    let verdict: String = row.try_get("verdict")?;
    let content_flags: String = row.try_get("content_flags")?;
    let content_flags: Vec<ContentFlag> = serde_json::from_str(&content_flags)?;

    Ok(Analysis {
        id: parse_uuid(&id)?,
        book_id: parse_uuid(&book_id)?,
        profile_hash: row.try_get("profile_hash")?,
        verdict: verdict.parse()?,
        age_recommendation: row.try_get("age_recommendation")?,
        summary: row.try_get("summary")?,
        content_flags,
        reasoning: row.try_get("reasoning")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::books::upsert_book;
    use safereads_common::db::init_in_memory_database;
    use safereads_common::models::{BookRecord, Severity};

    async fn seed_book(pool: &SqlitePool, google_id: &str) -> Uuid {
        let record = BookRecord {
            google_books_id: Some(google_id.to_string()),
            title: format!("Book {}", google_id),
            authors: vec!["A. Writer".to_string()],
            description: Some("Something happens.".to_string()),
            ..Default::default()
        };
        upsert_book(pool, &record).await.unwrap()
    }

    fn new_analysis(book_id: Uuid, hash: Option<&str>, verdict: Verdict) -> NewAnalysis {
        NewAnalysis {
            book_id,
            profile_hash: hash.map(str::to_string),
            verdict,
            age_recommendation: Some("12+".to_string()),
            summary: format!("{} summary", verdict),
            content_flags: vec![ContentFlag {
                category: "Violence".to_string(),
                severity: Severity::Mild,
                details: "Some fighting".to_string(),
            }],
            reasoning: None,
        }
    }

    #[tokio::test]
    async fn test_null_hash_only_matches_null_rows() {
        let db = init_in_memory_database().await.unwrap();
        let book_id = seed_book(&db, "v1").await;

        insert_analysis(&db, &new_analysis(book_id, Some("5-5-5-5-5-5"), Verdict::Caution))
            .await
            .unwrap();

        assert!(load_cached(&db, book_id, None).await.unwrap().is_none());

        let keyed = load_cached(&db, book_id, Some("5-5-5-5-5-5"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(keyed.verdict, Verdict::Caution);
        assert_eq!(keyed.content_flags.len(), 1);
        assert_eq!(keyed.content_flags[0].severity, Severity::Mild);
    }

    #[tokio::test]
    async fn test_newest_duplicate_wins() {
        let db = init_in_memory_database().await.unwrap();
        let book_id = seed_book(&db, "v2").await;

        insert_analysis(&db, &new_analysis(book_id, None, Verdict::Safe))
            .await
            .unwrap();
        let newer = insert_analysis(&db, &new_analysis(book_id, None, Verdict::Warning))
            .await
            .unwrap();

        let cached = load_cached(&db, book_id, None).await.unwrap().unwrap();
        assert_eq!(cached.id, newer.id);
    }

    #[tokio::test]
    async fn test_replace_leaves_single_row() {
        let db = init_in_memory_database().await.unwrap();
        let book_id = seed_book(&db, "v3").await;

        insert_analysis(&db, &new_analysis(book_id, None, Verdict::Safe))
            .await
            .unwrap();
        insert_analysis(&db, &new_analysis(book_id, None, Verdict::Safe))
            .await
            .unwrap();
        let replaced = replace_analysis(&db, &new_analysis(book_id, None, Verdict::Warning))
            .await
            .unwrap();

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analyses WHERE book_id = ?")
            .bind(book_id.to_string())
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let cached = load_cached(&db, book_id, None).await.unwrap().unwrap();
        assert_eq!(cached.id, replaced.id);
        assert_eq!(cached.verdict, Verdict::Warning);
    }

    #[tokio::test]
    async fn test_recent_joins_book_newest_first() {
        let db = init_in_memory_database().await.unwrap();
        let first = seed_book(&db, "r1").await;
        let second = seed_book(&db, "r2").await;

        insert_analysis(&db, &new_analysis(first, None, Verdict::Safe))
            .await
            .unwrap();
        insert_analysis(&db, &new_analysis(second, None, Verdict::Caution))
            .await
            .unwrap();

        let recent = list_recent(&db, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].book.id, second);
        assert_eq!(recent[0].book.title, "Book r2");
        assert_eq!(recent[1].analysis.book_id, first);

        let limited = list_recent(&db, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_verdict_counts_include_zeroes() {
        let db = init_in_memory_database().await.unwrap();
        let book_id = seed_book(&db, "c1").await;
        insert_analysis(&db, &new_analysis(book_id, None, Verdict::Warning))
            .await
            .unwrap();

        let counts = count_by_verdict(&db).await.unwrap();
        assert_eq!(counts.len(), 4);
        assert!(counts.contains(&(Verdict::Warning, 1)));
        assert!(counts.contains(&(Verdict::Safe, 0)));
    }
}
