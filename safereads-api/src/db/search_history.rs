//! Search history database operations

use safereads_common::models::SearchHistoryEntry;
use safereads_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_uuid};

pub async fn record_search(
    pool: &SqlitePool,
    user_id: &str,
    query: &str,
    result_count: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO search_history (id, user_id, query, result_count, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(query)
    .bind(result_count)
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest entries first
pub async fn list_history(
    pool: &SqlitePool,
    user_id: &str,
    limit: u32,
) -> Result<Vec<SearchHistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, query, result_count, created_at
        FROM search_history
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            Ok(SearchHistoryEntry {
                id: parse_uuid(&id)?,
                user_id: row.try_get("user_id")?,
                query: row.try_get("query")?,
                result_count: row.try_get("result_count")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Returns the number of entries removed
pub async fn clear_history(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM search_history WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
