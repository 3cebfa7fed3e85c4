//! Sensitivity profile database operations
//!
//! Each user has at most one default profile. The first profile a user
//! creates becomes the default; deleting the default promotes the oldest
//! remaining profile. Default changes run in a transaction.

use safereads_common::models::{Profile, SensitivitySettings};
use safereads_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{now_timestamp, parse_uuid};

const PROFILE_COLUMNS: &str = r#"
    id, user_id, name, violence, language, sexual_content, substance_use,
    dark_themes, religious_sensitivity, is_default, created_at
"#;

/// A user's profiles, oldest first
pub async fn list_profiles(pool: &SqlitePool, user_id: &str) -> Result<Vec<Profile>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM profiles WHERE user_id = ? ORDER BY created_at, rowid",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(profile_from_row).collect()
}

pub async fn load_profile(pool: &SqlitePool, id: Uuid) -> Result<Option<Profile>> {
    let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

pub async fn load_default_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<Profile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM profiles WHERE user_id = ? AND is_default = 1 LIMIT 1",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Create a profile; the user's first profile becomes the default
pub async fn create_profile(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    settings: &SensitivitySettings,
) -> Result<Profile> {
    settings.validate()?;

    let mut tx = pool.begin().await?;

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    let profile = Profile {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        settings: *settings,
        is_default: existing == 0,
        created_at: now_timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO profiles (
            id, user_id, name, violence, language, sexual_content, substance_use,
            dark_themes, religious_sensitivity, is_default, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.id.to_string())
    .bind(&profile.user_id)
    .bind(&profile.name)
    .bind(settings.violence)
    .bind(settings.language)
    .bind(settings.sexual_content)
    .bind(settings.substance_use)
    .bind(settings.dark_themes)
    .bind(settings.religious_sensitivity)
    .bind(profile.is_default)
    .bind(&profile.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        profile_id = %profile.id,
        user_id = %user_id,
        is_default = profile.is_default,
        "Created sensitivity profile"
    );

    Ok(profile)
}

/// Rename and/or change settings
pub async fn update_profile(
    pool: &SqlitePool,
    id: Uuid,
    name: Option<&str>,
    settings: Option<&SensitivitySettings>,
) -> Result<Profile> {
    let mut profile = load_profile(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Profile {}", id)))?;

    if let Some(name) = name {
        profile.name = name.to_string();
    }
    if let Some(settings) = settings {
        settings.validate()?;
        profile.settings = *settings;
    }

    let s = &profile.settings;
    sqlx::query(
        r#"
        UPDATE profiles
        SET name = ?, violence = ?, language = ?, sexual_content = ?, substance_use = ?,
            dark_themes = ?, religious_sensitivity = ?
        WHERE id = ?
        "#,
    )
    .bind(&profile.name)
    .bind(s.violence)
    .bind(s.language)
    .bind(s.sexual_content)
    .bind(s.substance_use)
    .bind(s.dark_themes)
    .bind(s.religious_sensitivity)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(profile)
}

/// Make `id` the only default profile of its owner
pub async fn set_default_profile(pool: &SqlitePool, id: Uuid) -> Result<Profile> {
    let mut tx = pool.begin().await?;

    let user_id = owner_of(&mut tx, id).await?;

    sqlx::query("UPDATE profiles SET is_default = 0 WHERE user_id = ?")
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE profiles SET is_default = 1 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    load_profile(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Profile {}", id)))
}

/// Delete a profile, promoting the owner's oldest remaining one if needed
pub async fn delete_profile(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("SELECT user_id, is_default FROM profiles WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Profile {}", id)))?;
    let user_id: String = row.try_get("user_id")?;
    let was_default: bool = row.try_get("is_default")?;

    sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    if was_default {
        sqlx::query(
            r#"
            UPDATE profiles SET is_default = 1
            WHERE id = (
                SELECT id FROM profiles WHERE user_id = ?
                ORDER BY created_at, rowid LIMIT 1
            )
            "#,
        )
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(profile_id = %id, promoted = was_default, "Deleted sensitivity profile");
    Ok(())
}

async fn owner_of(conn: &mut SqliteConnection, id: Uuid) -> Result<String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM profiles WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|(user_id,)| user_id)
        .ok_or_else(|| Error::NotFound(format!("Profile {}", id)))
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    let id: String = row.try_get("id")?;

    Ok(Profile {
        id: parse_uuid(&id)?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        settings: SensitivitySettings {
            violence: row.try_get("violence")?,
            language: row.try_get("language")?,
            sexual_content: row.try_get("sexual_content")?,
            substance_use: row.try_get("substance_use")?,
            dark_themes: row.try_get("dark_themes")?,
            religious_sensitivity: row.try_get("religious_sensitivity")?,
        },
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
    })
}
