//! API key resolution for safereads-api
//!
//! Provides multi-tier resolution with Database → ENV → TOML priority, and
//! best-effort write-back of database settings into the TOML file.

use safereads_common::config::{read_toml_config, write_toml_config, TomlConfig};
use safereads_common::Result;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::db::settings;

/// One API key and where to look for it
struct KeySources<'a> {
    label: &'static str,
    env_vars: &'static [&'static str],
    database: Option<String>,
    toml: Option<&'a String>,
}

/// Resolve the OpenAI API key
///
/// **Priority:** Database → `SAFEREADS_OPENAI_API_KEY` / `OPENAI_API_KEY` → TOML
///
/// `None` is not an error: the service starts and model-dependent
/// operations report `NOT_CONFIGURED`.
pub async fn resolve_openai_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let sources = KeySources {
        label: "OpenAI API key",
        env_vars: &["SAFEREADS_OPENAI_API_KEY", "OPENAI_API_KEY"],
        database: settings::get_openai_api_key(db).await?,
        toml: toml_config.openai_api_key.as_ref(),
    };
    Ok(resolve_key(sources))
}

/// Resolve the Google Books API key
///
/// **Priority:** Database → `SAFEREADS_GOOGLE_BOOKS_API_KEY` / `GOOGLE_BOOKS_API_KEY` → TOML
pub async fn resolve_google_books_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let sources = KeySources {
        label: "Google Books API key",
        env_vars: &["SAFEREADS_GOOGLE_BOOKS_API_KEY", "GOOGLE_BOOKS_API_KEY"],
        database: settings::get_google_books_api_key(db).await?,
        toml: toml_config.google_books_api_key.as_ref(),
    };
    Ok(resolve_key(sources))
}

fn resolve_key(sources: KeySources<'_>) -> Option<String> {
    let db_key = sources.database.filter(|k| is_valid_key(k));
    let env_key = sources
        .env_vars
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|k| is_valid_key(k));
    let toml_key = sources.toml.filter(|k| is_valid_key(k)).cloned();

    let found: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if found.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            sources.label,
            found.join(", "),
            found[0]
        );
    }

    match found.first() {
        Some(source) => info!("{} loaded from {}", sources.label, source),
        None => warn!("{} not configured", sources.label),
    }

    db_key.or(env_key).or(toml_key)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Sync settings from database to TOML file
///
/// HashMap keys: "openai_api_key", "google_books_api_key". A failed write
/// is logged and swallowed; the database stays authoritative.
pub async fn sync_settings_to_toml(settings: HashMap<String, String>, toml_path: &Path) -> Result<()> {
    let mut config = if toml_path.exists() {
        read_toml_config(toml_path)?
    } else {
        TomlConfig::default()
    };

    if let Some(key) = settings.get(settings::OPENAI_API_KEY) {
        config.openai_api_key = Some(key.clone());
    }
    if let Some(key) = settings.get(settings::GOOGLE_BOOKS_API_KEY) {
        config.google_books_api_key = Some(key.clone());
    }

    match write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use safereads_common::db::init_in_memory_database;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "SAFEREADS_OPENAI_API_KEY",
            "OPENAI_API_KEY",
            "SAFEREADS_GOOGLE_BOOKS_API_KEY",
            "GOOGLE_BOOKS_API_KEY",
        ] {
            std::env::remove_var(name);
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_database_beats_environment_and_toml() {
        clear_env();
        let db = init_in_memory_database().await.unwrap();
        settings::set_openai_api_key(&db, "db-key".to_string()).await.unwrap();
        std::env::set_var("OPENAI_API_KEY", "env-key");
        let config = TomlConfig {
            openai_api_key: Some("toml-key".to_string()),
            ..Default::default()
        };

        let key = resolve_openai_api_key(&db, &config).await.unwrap();
        assert_eq!(key.as_deref(), Some("db-key"));
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_prefixed_environment_variable_wins() {
        clear_env();
        let db = init_in_memory_database().await.unwrap();
        std::env::set_var("SAFEREADS_GOOGLE_BOOKS_API_KEY", "prefixed");
        std::env::set_var("GOOGLE_BOOKS_API_KEY", "plain");

        let key = resolve_google_books_api_key(&db, &TomlConfig::default())
            .await
            .unwrap();
        assert_eq!(key.as_deref(), Some("prefixed"));
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_blank_values_are_skipped() {
        clear_env();
        let db = init_in_memory_database().await.unwrap();
        std::env::set_var("OPENAI_API_KEY", "   ");
        let config = TomlConfig {
            openai_api_key: Some("toml-key".to_string()),
            ..Default::default()
        };

        let key = resolve_openai_api_key(&db, &config).await.unwrap();
        assert_eq!(key.as_deref(), Some("toml-key"));

        let none = resolve_openai_api_key(&db, &TomlConfig::default()).await.unwrap();
        assert!(none.is_none());
        clear_env();
    }

    #[tokio::test]
    async fn test_sync_writes_key_and_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safereads.toml");
        let existing = TomlConfig {
            free_analysis_limit: 7,
            ..Default::default()
        };
        write_toml_config(&existing, &path).unwrap();

        let mut updates = HashMap::new();
        updates.insert(settings::OPENAI_API_KEY.to_string(), "sk-new".to_string());
        sync_settings_to_toml(updates, &path).await.unwrap();

        let written = read_toml_config(&path).unwrap();
        assert_eq!(written.openai_api_key.as_deref(), Some("sk-new"));
        assert_eq!(written.free_analysis_limit, 7);
    }
}
