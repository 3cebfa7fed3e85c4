//! User database operations
//!
//! Identity comes from the external auth provider; this table mirrors it and
//! carries the entitlement fields (analysis count, subscription state).

use safereads_common::models::{SubscriptionStatus, UserRecord};
use safereads_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::now_timestamp;

const USER_COLUMNS: &str = r#"
    id, email, name, analysis_count, subscription_status,
    subscription_current_period_end, created_at
"#;

/// Create the user on first sight, refresh email/name afterwards
pub async fn sync_user(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    name: Option<&str>,
) -> Result<UserRecord> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, analysis_count, created_at)
        VALUES (?, ?, ?, 0, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            name = COALESCE(excluded.name, users.name)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(name)
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    load_user(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("User {} vanished after sync", id)))
}

pub async fn load_user(pool: &SqlitePool, id: &str) -> Result<Option<UserRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Case-insensitive email lookup
pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE lower(email) = lower(?) ORDER BY created_at LIMIT 1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Count one fresh analysis against the user's lifetime total
pub async fn increment_analysis_count(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("UPDATE users SET analysis_count = analysis_count + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }
    Ok(())
}

/// Mirror subscription state pushed by the billing provider
pub async fn update_subscription(
    pool: &SqlitePool,
    id: &str,
    status: Option<SubscriptionStatus>,
    current_period_end: Option<i64>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET subscription_status = ?, subscription_current_period_end = ?
        WHERE id = ?
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(current_period_end)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }
    Ok(())
}

/// Active subscription with no period end, looked up by email
pub async fn grant_lifetime(pool: &SqlitePool, email: &str) -> Result<UserRecord> {
    let user = find_user_by_email(pool, email)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User with email {}", email)))?;

    update_subscription(pool, &user.id, Some(SubscriptionStatus::Active), None).await?;

    tracing::info!(user_id = %user.id, "Granted lifetime access");

    load_user(pool, &user.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", user.id)))
}

/// Newest users first
pub async fn list_users(pool: &SqlitePool, limit: u32) -> Result<Vec<UserRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, rowid DESC LIMIT ?",
        USER_COLUMNS
    ))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(user_from_row).collect()
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    let status: Option<String> = row.try_get("subscription_status")?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        analysis_count: row.try_get("analysis_count")?,
        subscription_status: status.as_deref().map(str::parse).transpose()?,
        subscription_current_period_end: row.try_get("subscription_current_period_end")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use safereads_common::db::init_in_memory_database;

    #[tokio::test]
    async fn test_sync_creates_then_refreshes() {
        let db = init_in_memory_database().await.unwrap();

        let created = sync_user(&db, "user_1", "reader@example.com", Some("Reader"))
            .await
            .unwrap();
        assert_eq!(created.analysis_count, 0);
        assert!(!created.is_subscribed());

        increment_analysis_count(&db, "user_1").await.unwrap();

        let refreshed = sync_user(&db, "user_1", "new@example.com", None).await.unwrap();
        assert_eq!(refreshed.email, "new@example.com");
        assert_eq!(refreshed.name.as_deref(), Some("Reader"));
        assert_eq!(refreshed.analysis_count, 1);
    }

    #[tokio::test]
    async fn test_subscription_round_trip() {
        let db = init_in_memory_database().await.unwrap();
        sync_user(&db, "user_2", "sub@example.com", None).await.unwrap();

        update_subscription(&db, "user_2", Some(SubscriptionStatus::Active), Some(1_900_000_000))
            .await
            .unwrap();

        let user = load_user(&db, "user_2").await.unwrap().unwrap();
        assert!(user.is_subscribed());
        assert_eq!(user.subscription_current_period_end, Some(1_900_000_000));
    }

    #[tokio::test]
    async fn test_unknown_user_updates_fail() {
        let db = init_in_memory_database().await.unwrap();

        assert!(matches!(
            increment_analysis_count(&db, "ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            update_subscription(&db, "ghost", None, None).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let db = init_in_memory_database().await.unwrap();
        sync_user(&db, "user_3", "Mixed@Example.com", None).await.unwrap();

        let found = find_user_by_email(&db, "mixed@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("user_3".to_string()));
    }

    #[tokio::test]
    async fn test_grant_lifetime() {
        let db = init_in_memory_database().await.unwrap();
        sync_user(&db, "user_4", "vip@example.com", None).await.unwrap();
        update_subscription(&db, "user_4", Some(SubscriptionStatus::Canceled), Some(1))
            .await
            .unwrap();

        let granted = grant_lifetime(&db, "VIP@example.com").await.unwrap();
        assert!(granted.is_subscribed());
        assert_eq!(granted.subscription_current_period_end, None);

        assert!(matches!(
            grant_lifetime(&db, "nobody@example.com").await,
            Err(Error::NotFound(_))
        ));
    }
}
